use crate::backend::{PackageRequest, Packager};
use crate::prereq::command_exists;
use crate::PackagerError;
use bootrpm_schema::BuildRecord;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const LICENSE: &str = "GPLv3";

/// Builds noarch RPMs with the host's `rpmbuild`.
///
/// The build record is stored as the package description, so `rpm -qp`
/// can read it back without unpacking the payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct RpmbuildPackager;

impl RpmbuildPackager {
    pub fn new() -> Self {
        Self
    }
}

/// RPM spec files expand macros everywhere, including in free text.
fn escape_macros(s: &str) -> String {
    s.replace('%', "%%")
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn source_name(index: usize) -> String {
    format!("payload-{index}")
}

/// Render the spec file for `request`. Payload file `i` is expected in the
/// source directory as `payload-<i>`.
pub fn render_spec(request: &PackageRequest) -> String {
    let mut spec = String::new();
    let _ = writeln!(spec, "Name:           {}", request.name);
    let _ = writeln!(spec, "Version:        {}", request.identifier.base);
    let _ = writeln!(spec, "Release:        {}", request.identifier.release);
    let _ = writeln!(
        spec,
        "Summary:        {}",
        escape_macros(&single_line(&request.summary))
    );
    let _ = writeln!(spec, "License:        {LICENSE}");
    let _ = writeln!(spec, "BuildArch:      noarch");
    for req in &request.requires {
        let _ = writeln!(spec, "Requires:       {}", escape_macros(&single_line(req)));
    }

    let _ = writeln!(spec, "\n%description\n{}", escape_macros(&request.record));

    spec.push_str("\n%install\n");
    for (i, file) in request.files.iter().enumerate() {
        let _ = writeln!(
            spec,
            "install -D -m {:04o} \"%{{_sourcedir}}/{}\" \"%{{buildroot}}{}\"",
            file.mode,
            source_name(i),
            escape_macros(&file.install_path)
        );
    }

    spec.push_str("\n%files\n");
    for file in &request.files {
        let _ = writeln!(
            spec,
            "%attr({:04o}, root, root) \"{}\"",
            file.mode,
            escape_macros(&file.install_path)
        );
    }

    if let Some(post) = &request.post_install {
        let _ = writeln!(spec, "\n%post\n{}", escape_macros(post.trim_end()));
    }
    spec
}

impl Packager for RpmbuildPackager {
    fn name(&self) -> &'static str {
        "rpmbuild"
    }

    fn available(&self) -> bool {
        command_exists("rpmbuild") && command_exists("rpm")
    }

    fn extension(&self) -> &'static str {
        "noarch.rpm"
    }

    fn package(&self, request: &PackageRequest, output: &Path) -> Result<(), PackagerError> {
        if !self.available() {
            return Err(PackagerError::Unavailable(self.name().to_owned()));
        }

        let staging = tempfile::tempdir()?;
        let topdir = staging.path();
        let sources = topdir.join("SOURCES");
        let specs = topdir.join("SPECS");
        fs::create_dir_all(&sources)?;
        fs::create_dir_all(&specs)?;
        for (i, file) in request.files.iter().enumerate() {
            fs::write(sources.join(source_name(i)), &file.content)?;
        }
        let spec_path = specs.join(format!("{}.spec", request.name));
        fs::write(&spec_path, render_spec(request))?;

        let result = Command::new("rpmbuild")
            .arg("--define")
            .arg(format!("_topdir {}", topdir.display()))
            .args(["--quiet", "-bb"])
            .arg(&spec_path)
            .output()
            .map_err(|e| PackagerError::Failed(format!("rpmbuild failed to start: {e}")))?;
        if !result.status.success() {
            return Err(PackagerError::Failed(format!(
                "rpmbuild exited with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let built = topdir.join("RPMS").join("noarch").join(format!(
            "{}-{}.{}",
            request.name,
            request.identifier,
            self.extension()
        ));
        if !built.is_file() {
            return Err(PackagerError::Failed(format!(
                "rpmbuild did not produce {}",
                built.display()
            )));
        }
        fs::copy(&built, output)?;
        fs::File::open(output)?.sync_all()?;
        debug!("rpmbuild produced {}", built.display());
        Ok(())
    }

    fn read_record(&self, archive: &Path) -> Result<BuildRecord, PackagerError> {
        let result = Command::new("rpm")
            .args(["-qp", "--queryformat", "%{DESCRIPTION}"])
            .arg(archive)
            .output()
            .map_err(|e| PackagerError::Failed(format!("rpm failed to start: {e}")))?;
        if !result.status.success() {
            return Err(PackagerError::Failed(format!(
                "rpm query of {} failed: {}",
                archive.display(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        let description = String::from_utf8_lossy(&result.stdout);
        let description = description.trim();
        if description.is_empty() {
            return Err(PackagerError::RecordMissing(
                archive.to_string_lossy().into_owned(),
            ));
        }
        Ok(BuildRecord::from_json(description.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootrpm_schema::{BaseVersion, BuildIdentifier, DesiredConfiguration, PackageSpec};

    fn request(post: Option<&str>) -> (PackageRequest, BuildRecord) {
        let mut spec = PackageSpec::new(
            "katello-ca-consumer-proxy.example.com",
            BaseVersion::new("1.0").unwrap(),
        );
        spec.summary = "Consumer\nbootstrap at 100%".to_owned();
        spec.requires = vec!["subscription-manager".to_owned()];
        spec.post_install = post.map(str::to_owned);
        let desired = DesiredConfiguration::new(
            spec,
            "/usr/bin/katello-rhsm-consumer",
            "#!/bin/sh\n",
            "/srv/pub",
        )
        .with_certificate("/etc/rhsm/ca/katello-server-ca.pem", "PEM")
        .with_input("note", "50%");
        let id = BuildIdentifier::new(BaseVersion::new("1.0").unwrap(), 4).unwrap();
        let record = BuildRecord::new(id, desired.fingerprint(), "rpmbuild");
        (PackageRequest::new(&desired, &record).unwrap(), record)
    }

    #[test]
    fn spec_has_header_fields() {
        let (req, _) = request(None);
        let spec = render_spec(&req);
        assert!(spec.contains("Name:           katello-ca-consumer-proxy.example.com\n"));
        assert!(spec.contains("Version:        1.0\n"));
        assert!(spec.contains("Release:        4\n"));
        assert!(spec.contains("Summary:        Consumer bootstrap at 100%%\n"));
        assert!(spec.contains("BuildArch:      noarch\n"));
        assert!(spec.contains("Requires:       subscription-manager\n"));
        assert!(!spec.contains("%post"));
    }

    #[test]
    fn spec_installs_every_payload_file() {
        let (req, _) = request(None);
        let spec = render_spec(&req);
        assert!(spec.contains(
            "install -D -m 0755 \"%{_sourcedir}/payload-0\" \"%{buildroot}/usr/bin/katello-rhsm-consumer\""
        ));
        assert!(spec.contains(
            "install -D -m 0644 \"%{_sourcedir}/payload-1\" \"%{buildroot}/etc/rhsm/ca/katello-server-ca.pem\""
        ));
        assert!(spec.contains("%attr(0755, root, root) \"/usr/bin/katello-rhsm-consumer\""));
        assert!(spec.contains("%attr(0644, root, root) \"/etc/rhsm/ca/katello-server-ca.pem\""));
    }

    #[test]
    fn spec_escapes_macros_and_line_breaks_in_metadata() {
        let (mut req, _) = request(None);
        req.requires = vec!["sm\n%post\necho injected".to_owned()];
        req.files[0].install_path = "/usr/bin/%{_bindir}x".to_owned();
        let spec = render_spec(&req);

        assert!(spec.contains("Requires:       sm %%post echo injected\n"));
        assert!(!spec.contains("\n%post"));
        assert!(spec.contains("\"%{buildroot}/usr/bin/%%{_bindir}x\""));
        assert!(spec.contains("%attr(0755, root, root) \"/usr/bin/%%{_bindir}x\""));
        assert!(!spec.contains("/usr/bin/%{_bindir}x"));
    }

    #[test]
    fn spec_description_is_escaped_record() {
        let (req, _) = request(None);
        let spec = render_spec(&req);
        let description = spec
            .split("%description\n")
            .nth(1)
            .and_then(|rest| rest.lines().next())
            .unwrap();
        assert!(description.contains("50%%"));
        let unescaped = description.replace("%%", "%");
        assert_eq!(unescaped, req.record);
    }

    #[test]
    fn spec_includes_post_install() {
        let (req, _) = request(Some("/usr/bin/katello-rhsm-consumer\n"));
        let spec = render_spec(&req);
        assert!(spec.ends_with("%post\n/usr/bin/katello-rhsm-consumer\n"));
    }

    #[test]
    fn rpmbuild_roundtrip_when_available() {
        let packager = RpmbuildPackager::new();
        if !packager.available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.rpm");
        let (req, record) = request(None);
        packager.package(&req, &out).unwrap();
        assert_eq!(packager.read_record(&out).unwrap(), record);
    }
}
