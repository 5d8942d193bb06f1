//! Mount-time configuration

/// Options controlling how an image is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountOptions {
    /// Honour SUSP / Rock Ridge entries
    pub rock_ridge: bool,

    /// Allow a Joliet supplementary descriptor to supply the root
    pub joliet: bool,

    /// Maximum chain of CL (relocated directory) redirections per record
    pub max_relocation_depth: usize,

    /// Maximum number of CE continuation areas followed per record
    pub max_continuation_areas: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            rock_ridge: true,
            joliet: true,
            max_relocation_depth: 8,
            max_continuation_areas: 32,
        }
    }
}

impl MountOptions {
    /// Enable or disable Rock Ridge
    pub fn with_rock_ridge(mut self, enabled: bool) -> Self {
        self.rock_ridge = enabled;
        self
    }

    /// Enable or disable Joliet
    pub fn with_joliet(mut self, enabled: bool) -> Self {
        self.joliet = enabled;
        self
    }

    /// Bound CL redirection depth
    pub fn with_max_relocation_depth(mut self, depth: usize) -> Self {
        self.max_relocation_depth = depth;
        self
    }

    /// Bound the number of continuation areas followed
    pub fn with_max_continuation_areas(mut self, count: usize) -> Self {
        self.max_continuation_areas = count;
        self
    }
}
