use core_types::PartitionYear;
use std::fmt;

/// Where one yearly partition lives and the credential used to reach it.
#[derive(Clone, PartialEq, Eq)]
pub struct PartitionDescriptor {
    year: PartitionYear,
    locator: String,
    credential: Option<String>,
}

impl PartitionDescriptor {
    pub fn new(year: PartitionYear, locator: impl Into<String>, credential: Option<String>) -> Self {
        Self {
            year,
            locator: locator.into(),
            credential,
        }
    }

    pub fn year(&self) -> PartitionYear {
        self.year
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }
}

// The credential never appears in logs.
impl fmt::Debug for PartitionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartitionDescriptor")
            .field("year", &self.year)
            .field("locator", &self.locator)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
