pub mod legacy;
pub mod medai;
use std::sync::Arc;

use anyhow::Result;

use crate::domain::models::BackendName;
use crate::domain::models::SharedBackend;

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: BackendName) -> Result<SharedBackend> {
        match name {
            BackendName::MedAI => return Ok(Arc::<medai::MedAI>::default()),
            BackendName::Legacy => return Ok(Arc::<legacy::Legacy>::default()),
        }
    }
}
