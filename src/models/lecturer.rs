use serde::{Deserialize, Serialize};

use crate::{error::Result, store::Entity};

/// A lecturer held in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lecturer {
    /// The generated object id (32 lowercase hex characters).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub designation: String,
}

impl Entity for Lecturer {
    const NAMESPACE: &'static str = "lecturer";

    fn key(&self) -> Option<String> {
        self.id.clone()
    }

    fn set_key(&mut self, key: &str) -> Result<()> {
        self.id = Some(key.to_string());
        Ok(())
    }
}
