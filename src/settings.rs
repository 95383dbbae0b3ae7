use crate::jvm::BinaryName;
use std::fmt;
use std::str::FromStr;

/// Which interpreter to run over each method
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Policy {
    /// Track only the kind of each value
    Basic,

    /// Track kinds and check every instruction's operands
    Verify,

    /// Track reference types and check them against the class graph
    Simple,

    /// Track which instructions produced each value
    Source,
}

impl Policy {
    pub const ALL: [Policy; 4] = [Policy::Basic, Policy::Verify, Policy::Simple, Policy::Source];

    pub fn name(self) -> &'static str {
        match self {
            Policy::Basic => "basic",
            Policy::Verify => "verify",
            Policy::Simple => "simple",
            Policy::Source => "source",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> Result<Policy, String> {
        Policy::ALL
            .iter()
            .copied()
            .find(|policy| policy.name() == s)
            .ok_or_else(|| format!("Unknown policy '{}'", s))
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Interpreter used for the analysis
    pub policy: Policy,

    /// Recompute `max_stack` and `max_locals` even when the listing declares them
    pub compute_maxs: bool,

    /// Print the frame before every instruction
    pub print_frames: bool,

    /// Print the stack map frames (only meaningful with [`Policy::Simple`])
    pub print_stack_map: bool,

    /// Keep analyzing the remaining methods after one fails
    pub keep_going: bool,

    /// Class owning the methods declared outside of any `.class`
    pub default_owner: BinaryName,
}

impl Settings {
    pub fn new() -> Settings {
        Settings {
            policy: Policy::Simple,
            compute_maxs: false,
            print_frames: true,
            print_stack_map: false,
            keep_going: false,
            default_owner: BinaryName::MAIN,
        }
    }
}

impl Default for Settings {
    fn default() -> Settings {
        Settings::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::Name;

    #[test]
    fn policy_names() {
        for policy in Policy::ALL {
            assert_eq!(policy.to_string().parse::<Policy>(), Ok(policy));
        }
        assert_eq!("simple".parse::<Policy>(), Ok(Policy::Simple));
        assert!("full".parse::<Policy>().is_err());
        assert!("Basic".parse::<Policy>().is_err());
    }

    #[test]
    fn defaults() {
        let settings = Settings::new();
        assert_eq!(settings.policy, Policy::Simple);
        assert!(!settings.compute_maxs);
        assert!(settings.print_frames);
        assert!(!settings.print_stack_map);
        assert!(!settings.keep_going);
        assert_eq!(settings.default_owner.as_str(), "Main");
    }
}
