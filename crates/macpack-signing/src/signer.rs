//! External signing tools

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, SigningError};
use crate::options::{FlatOptions, SignOptions};

/// The operations that sign bytes on disk
#[async_trait]
pub trait ExternalSigner: Send + Sync {
    /// Sign an application bundle, nested code included
    async fn sign(&self, options: &SignOptions) -> Result<()>;

    /// Build a signed installer package from a signed bundle
    async fn flat(&self, options: &FlatOptions) -> Result<()>;
}

/// [`ExternalSigner`] using `codesign` and `productbuild`
#[derive(Debug, Clone)]
pub struct CodesignSigner {
    codesign_path: PathBuf,
    productbuild_path: PathBuf,
    spctl_path: PathBuf,
}

impl CodesignSigner {
    pub fn new() -> Self {
        Self {
            codesign_path: PathBuf::from("/usr/bin/codesign"),
            productbuild_path: PathBuf::from("/usr/bin/productbuild"),
            spctl_path: PathBuf::from("/usr/sbin/spctl"),
        }
    }

    /// Nested code inside `app`, deepest first
    pub fn nested_code(app: &Path) -> Vec<PathBuf> {
        let frameworks = app.join("Contents").join("Frameworks");
        let mut nested: Vec<(usize, PathBuf)> = WalkDir::new(&frameworks)
            .min_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                let path = e.path();
                match path.extension().and_then(|x| x.to_str()) {
                    Some("app") | Some("framework") => e.file_type().is_dir(),
                    Some("dylib") => e.file_type().is_file(),
                    _ => false,
                }
            })
            .map(|e| (e.depth(), e.into_path()))
            .collect();

        nested.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        nested.into_iter().map(|(_, path)| path).collect()
    }

    fn codesign_args<'a>(
        options: &'a SignOptions,
        entitlements: Option<&'a Path>,
        target: &'a str,
    ) -> Vec<std::borrow::Cow<'a, str>> {
        let mut args: Vec<std::borrow::Cow<'a, str>> = vec![
            "--sign".into(),
            options.identity.as_str().into(),
            "--force".into(),
        ];
        if let Some(keychain) = &options.keychain {
            args.push("--keychain".into());
            args.push(keychain.as_str().into());
        }
        if options.hardened_runtime {
            args.push("--options".into());
            args.push("runtime".into());
        }
        if let Some(entitlements) = entitlements {
            args.push("--entitlements".into());
            args.push(entitlements.to_string_lossy());
        }
        args.push(target.into());
        args
    }

    async fn run(tool: &Path, args: &[std::borrow::Cow<'_, str>]) -> Result<()> {
        let name = tool
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        debug!(tool = %name, ?args, "running signing tool");

        let output = Command::new(tool)
            .args(args.iter().map(|a| a.as_ref()))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(SigningError::ToolFailed {
                tool: name,
                reason: if stderr.trim().is_empty() { stdout } else { stderr },
            });
        }
        Ok(())
    }
}

impl Default for CodesignSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalSigner for CodesignSigner {
    async fn sign(&self, options: &SignOptions) -> Result<()> {
        if !options.app.exists() {
            return Err(SigningError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Application bundle not found: {}", options.app.display()),
            )));
        }

        let inherit = options
            .entitlements_inherit
            .as_deref()
            .or(options.entitlements.as_deref());
        for nested in Self::nested_code(&options.app) {
            let target = nested.to_string_lossy();
            Self::run(
                &self.codesign_path,
                &Self::codesign_args(options, inherit, &target),
            )
            .await?;
        }

        let app = options.app.to_string_lossy();
        info!(app = %options.app.display(), identity = %options.identity, "signing application bundle");
        Self::run(
            &self.codesign_path,
            &Self::codesign_args(options, options.entitlements.as_deref(), &app),
        )
        .await?;

        if options.gatekeeper_assess {
            Self::run(
                &self.spctl_path,
                &["--assess".into(), "--type".into(), "execute".into(), app.clone()],
            )
            .await?;
        }

        Ok(())
    }

    async fn flat(&self, options: &FlatOptions) -> Result<()> {
        let app = options.app.to_string_lossy();
        let pkg = options.pkg.to_string_lossy();
        let mut args: Vec<std::borrow::Cow<'_, str>> = vec![
            "--component".into(),
            app,
            "/Applications".into(),
            "--sign".into(),
            options.identity.as_str().into(),
        ];
        if let Some(keychain) = &options.keychain {
            args.push("--keychain".into());
            args.push(keychain.as_str().into());
        }
        args.push(pkg);

        info!(pkg = %options.pkg.display(), identity = %options.identity, "building installer package");
        Self::run(&self.productbuild_path, &args).await
    }
}

/// [`ExternalSigner`] that only logs what would be signed
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunSigner;

#[async_trait]
impl ExternalSigner for DryRunSigner {
    async fn sign(&self, options: &SignOptions) -> Result<()> {
        info!(
            app = %options.app.display(),
            identity = %options.identity,
            platform = %options.platform,
            entitlements = ?options.entitlements,
            "dry run: would sign application bundle"
        );
        Ok(())
    }

    async fn flat(&self, options: &FlatOptions) -> Result<()> {
        info!(
            pkg = %options.pkg.display(),
            identity = %options.identity,
            "dry run: would build installer package"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SignPlatform;
    use tempfile::TempDir;

    #[test]
    fn test_nested_code_deepest_first() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("App.app");
        let frameworks = app.join("Contents/Frameworks");
        std::fs::create_dir_all(frameworks.join("Helper Framework.framework/Libraries")).unwrap();
        std::fs::write(
            frameworks.join("Helper Framework.framework/Libraries/libffmpeg.dylib"),
            b"",
        )
        .unwrap();
        std::fs::create_dir_all(frameworks.join("App Helper.app/Contents/MacOS")).unwrap();
        std::fs::write(frameworks.join("README"), b"").unwrap();

        let nested = CodesignSigner::nested_code(&app);
        assert_eq!(nested.len(), 3);
        assert!(nested[0].ends_with("libffmpeg.dylib"));
        assert!(nested.iter().any(|p| p.ends_with("App Helper.app")));
    }

    #[test]
    fn test_nested_code_without_frameworks() {
        let temp = TempDir::new().unwrap();
        assert!(CodesignSigner::nested_code(&temp.path().join("App.app")).is_empty());
    }

    #[test]
    fn test_codesign_args() {
        let mut options = SignOptions::new(
            PathBuf::from("/out/App.app"),
            SignPlatform::Darwin,
            "Developer ID Application: Acme".to_string(),
        )
        .with_keychain(Some("csc-1.keychain".to_string()));
        options.hardened_runtime = true;

        let args = CodesignSigner::codesign_args(
            &options,
            Some(Path::new("/build/osx.entitlements")),
            "/out/App.app",
        );
        let args: Vec<&str> = args.iter().map(|a| a.as_ref()).collect();
        assert_eq!(
            args,
            vec![
                "--sign",
                "Developer ID Application: Acme",
                "--force",
                "--keychain",
                "csc-1.keychain",
                "--options",
                "runtime",
                "--entitlements",
                "/build/osx.entitlements",
                "/out/App.app",
            ]
        );
    }

    #[tokio::test]
    async fn test_sign_missing_bundle() {
        let options = SignOptions::new(
            PathBuf::from("/nonexistent/App.app"),
            SignPlatform::Darwin,
            "id".to_string(),
        );
        let err = CodesignSigner::new().sign(&options).await.unwrap_err();
        assert!(matches!(err, SigningError::Io(_)));
    }
}
