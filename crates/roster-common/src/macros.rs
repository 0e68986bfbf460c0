/// Generates an `_or_default()` accessor for an `Option<String>` field that
/// falls back to a default when the field is `None` or blank.
///
/// # Usage
/// ```ignore
/// impl RegisterForm {
///     impl_or_default!(scheme_or_default, scheme, roster_common::DEFAULT_SCHEME);
///     impl_or_default!(pub, node_or_default, node, "local");
/// }
/// ```
#[macro_export]
macro_rules! impl_or_default {
    ($method_name:ident, $field:ident, $default:expr) => {
        fn $method_name(&self) -> &str {
            self.$field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or($default)
        }
    };
    (pub, $method_name:ident, $field:ident, $default:expr) => {
        pub fn $method_name(&self) -> &str {
            self.$field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or($default)
        }
    };
}
