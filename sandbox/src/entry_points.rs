//! Contract entry points and their calling convention.

use std::fmt;

/// Exported functions the VM can call. Every argument is a region pointer
/// and every entry point returns the region pointer of its JSON result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryPoint {
    /// `instantiate(env, info, msg)`
    Instantiate,
    /// `execute(env, info, msg)`
    Execute,
    /// `query(env, msg)`
    Query,
    /// `migrate(env, msg)`
    Migrate,
    /// `sudo(env, msg)`
    Sudo,
    /// `reply(env, reply)`
    Reply,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 6] = [
        EntryPoint::Instantiate,
        EntryPoint::Execute,
        EntryPoint::Query,
        EntryPoint::Migrate,
        EntryPoint::Sudo,
        EntryPoint::Reply,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::Execute => "execute",
            Self::Query => "query",
            Self::Migrate => "migrate",
            Self::Sudo => "sudo",
            Self::Reply => "reply",
        }
    }

    /// Number of region arguments.
    pub fn arity(&self) -> usize {
        match self {
            Self::Instantiate | Self::Execute => 3,
            Self::Query | Self::Migrate | Self::Sudo | Self::Reply => 2,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
