// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// A globally unique, persistent identifier for a logical resource.
///
/// This UUID represents the "idea" of a resource, completely decoupled from its
/// physical file path. It is the primary key of the metadata store, which maps it
/// to the logical path the resource currently lives at.
///
/// By using a stable UUID, resources can be moved or renamed without breaking
/// references to them held elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceUUID(Uuid);

impl ResourceUUID {
    /// Creates a new, random (version 4) `ResourceUUID`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a deterministic (version 5) `ResourceUUID` derived from a name,
    /// typically a logical path. The same name always yields the same UUID.
    pub fn new_v5(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceUUID {
    /// Creates a new, random (version 4) `ResourceUUID`.
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceUUID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for ResourceUUID {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v5_is_deterministic() {
        let a = ResourceUUID::new_v5("textures/grass.asset");
        let b = ResourceUUID::new_v5("textures/grass.asset");
        let c = ResourceUUID::new_v5("textures/stone.asset");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let uuid = ResourceUUID::new();
        let parsed: ResourceUUID = uuid.to_string().parse().unwrap();
        assert_eq!(uuid, parsed);
    }

    #[test]
    fn from_str_rejects_garbage() {
        assert!("not-a-uuid".parse::<ResourceUUID>().is_err());
    }
}
