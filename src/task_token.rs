use base64::{Engine, prelude::BASE64_STANDARD};
use std::fmt::{Debug, Display, Formatter};

/// Opaque token the service issues for each activity attempt. Empty for local activities, which
/// never talk to the service.
#[derive(Hash, Eq, PartialEq, Clone, Default, derive_more::From)]
pub struct TaskToken(pub Vec<u8>);

impl TaskToken {
    /// Returns true for the empty token carried by local activities
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bytes of the token
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Display for TaskToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&fmt_tt(&self.0))
    }
}

impl Debug for TaskToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskToken({})", fmt_tt(&self.0))
    }
}

pub(crate) fn fmt_tt(tt: &[u8]) -> String {
    BASE64_STANDARD.encode(tt)
}
