use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    pub name: String,
}

impl Patient {
    /// Builds a patient from operator input. Both values are trimmed; the
    /// error is a human readable reason suitable for showing the operator.
    pub fn from_input(id: &str, name: &str) -> Result<Self, String> {
        let id = id.trim();
        let name = name.trim();

        if id.is_empty() {
            return Err("patient id is required".into());
        }
        if name.is_empty() {
            return Err("patient name is required".into());
        }
        // Each value travels to the device as one line.
        if id.contains(['\r', '\n']) || name.contains(['\r', '\n']) {
            return Err("patient id and name must be single-line values".into());
        }

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
        })
    }
}
