use serde::Deserialize;

/// See [Google's documentation](https://gerrit.googlesource.com/git-repo/+/master/docs/manifest-format.md#Element-notice)
///
/// Printed to the user once per sync. The original schema allows arbitrary
/// text content; repo itself treats it as an opaque string.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Notice {
    #[serde(rename = "$text")]
    pub text: Option<String>,
}
