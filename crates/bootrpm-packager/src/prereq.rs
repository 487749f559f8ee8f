use std::fmt;
use std::process::Command;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: &'static str,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

pub(crate) fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn check_rpmbuild_prereqs() -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists("rpmbuild") {
        missing.push(MissingPrereq {
            name: "rpmbuild",
            purpose: "building the bootstrap RPM",
            install_hint: "dnf install rpm-build | zypper install rpm-build | apt install rpm",
        });
    }

    if !command_exists("rpm") {
        missing.push(MissingPrereq {
            name: "rpm",
            purpose: "reading build records back from published RPMs",
            install_hint: "dnf install rpm | zypper install rpm | apt install rpm",
        });
    }

    missing
}

/// Check the prerequisites of the named packager.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_prereqs(packager: &str) -> Vec<MissingPrereq> {
    match packager {
        "rpmbuild" => check_rpmbuild_prereqs(),
        _ => Vec::new(),
    }
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nbootrpm requires these tools to build packages; the 'tar' packager needs none.");
    msg
}
