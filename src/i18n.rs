// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持意大利语（默认）和英文
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 默认语言
pub const DEFAULT_LOCALE: &str = "it";

/// 支持的语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["it", "en"];

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言（不支持的语言回落到默认语言）
///
/// # 参数
/// - locale: 语言代码（"it" 或 "en"）
pub fn set_locale(locale: &str) {
    if SUPPORTED_LOCALES.contains(&locale) {
        rust_i18n::set_locale(locale);
    } else {
        tracing::warn!(locale, fallback = DEFAULT_LOCALE, "不支持的语言，使用默认语言");
        rust_i18n::set_locale(DEFAULT_LOCALE);
    }
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use backoffice_sync::i18n::t;
/// let msg = t("common.success");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use backoffice_sync::i18n::t_with_args;
/// let msg = t_with_args("import.file_not_found", &[("path", "/tmp/test.csv")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

// rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行；
// 依赖语言的测试（含导出布尔值）都需持有此锁。
#[cfg(test)]
pub(crate) static LOCALE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    fn lock() -> std::sync::MutexGuard<'static, ()> {
        LOCALE_TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_set_locale() {
        let _guard = lock();
        set_locale("en");
        assert_eq!(current_locale(), "en");

        set_locale("it");
        assert_eq!(current_locale(), "it");
    }

    #[test]
    fn test_unsupported_locale_falls_back() {
        let _guard = lock();
        set_locale("zh-CN");
        assert_eq!(current_locale(), DEFAULT_LOCALE);
    }

    #[test]
    fn test_translate_simple() {
        let _guard = lock();
        set_locale("it");
        assert_eq!(t("common.success"), "Operazione completata");

        set_locale("en");
        assert_eq!(t("common.success"), "Operation successful");

        set_locale(DEFAULT_LOCALE);
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = lock();
        set_locale("it");
        let msg = t_with_args("import.file_not_found", &[("path", "/tmp/test.csv")]);
        assert_eq!(msg, "File non trovato: /tmp/test.csv");

        set_locale("en");
        let msg = t_with_args("import.file_not_found", &[("path", "/tmp/test.csv")]);
        assert_eq!(msg, "File not found: /tmp/test.csv");

        set_locale(DEFAULT_LOCALE);
    }
}
