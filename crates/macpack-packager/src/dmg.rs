//! Disk image creation

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use macpack_core::config::DEFAULT_DMG_ICON_SIZE;
use macpack_core::resources::{BACKGROUND_PNG, ICON_ICNS};
use macpack_core::Compression;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::PackContext;
use crate::error::Result;
use crate::process::{find_tool, run_tool};
use crate::traits::ImageWriter;

/// Kind of a disk image window entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DmgEntryKind {
    /// Symbolic link, e.g. to `/Applications`
    Link,
    /// File copied into the image
    File,
}

/// One icon in the disk image window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmgEntry {
    pub x: u32,
    pub y: u32,
    #[serde(rename = "type")]
    pub kind: DmgEntryKind,
    pub path: PathBuf,
}

/// Everything needed to write a disk image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DmgSpecification {
    pub title: String,
    pub icon_size: u32,
    pub icon: Option<PathBuf>,
    pub background: Option<PathBuf>,
    pub contents: Vec<DmgEntry>,
    /// hdiutil image format
    pub format: String,
}

impl DmgSpecification {
    /// Compute the specification for the bundle in `app_out_dir`
    pub fn compute(ctx: &PackContext, app_out_dir: &Path) -> Self {
        let config = &ctx.config;
        let mac = &config.mac;

        let icon = match &mac.icon {
            Some(icon) => Some(ctx.project_path(icon)),
            None => {
                let found = ctx.resources.resolve(ICON_ICNS);
                if found.is_none() {
                    warn!("Application icon is not set, default icon will be used");
                }
                found
            }
        };

        let background = match &mac.background {
            Some(background) => Some(ctx.project_path(background)),
            None => ctx.resources.resolve(BACKGROUND_PNG),
        };

        let format = mac.dmg.format.clone().unwrap_or_else(|| {
            if config.compression == Compression::Store {
                "UDRO".to_string()
            } else {
                "UDBZ".to_string()
            }
        });

        Self {
            title: mac
                .dmg
                .title
                .clone()
                .unwrap_or_else(|| config.product_name.clone()),
            icon_size: mac.dmg.icon_size.unwrap_or(DEFAULT_DMG_ICON_SIZE),
            icon,
            background,
            contents: vec![
                DmgEntry {
                    x: 410,
                    y: 220,
                    kind: DmgEntryKind::Link,
                    path: PathBuf::from("/Applications"),
                },
                DmgEntry {
                    x: 130,
                    y: 220,
                    kind: DmgEntryKind::File,
                    path: app_out_dir.join(format!("{}.app", config.product_name)),
                },
            ],
            format,
        }
    }
}

/// Finder window size used for the disk image layout
pub const WINDOW_SIZE: (u32, u32) = (540, 380);

/// Name of an entry inside the image, e.g. `Applications` or `App.app`
fn entry_name(entry: &DmgEntry) -> String {
    entry
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn escape_applescript(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', r#"\""#)
}

/// Finder script applying the window layout to the mounted volume
pub fn layout_script(spec: &DmgSpecification) -> String {
    let (width, height) = WINDOW_SIZE;
    let background = spec
        .background
        .as_ref()
        .and_then(|path| path.file_name())
        .map(|name| {
            format!(
                "set background picture of viewOptions to file \".background:{}\"\n",
                escape_applescript(&name.to_string_lossy())
            )
        })
        .unwrap_or_default();
    let positions: String = spec
        .contents
        .iter()
        .map(|entry| {
            format!(
                "set position of item \"{}\" to {{{}, {}}}\n",
                escape_applescript(&entry_name(entry)),
                entry.x,
                entry.y
            )
        })
        .collect();

    format!(
        r#"tell application "Finder"
tell disk "{volume}"
open
set current view of container window to icon view
set toolbar visible of container window to false
set statusbar visible of container window to false
set bounds of container window to {{100, 100, {right}, {bottom}}}
set viewOptions to icon view options of container window
set arrangement of viewOptions to not arranged
set icon size of viewOptions to {icon_size}
{background}{positions}close
open
update without registering applications
delay 2
end tell
end tell
"#,
        volume = escape_applescript(&spec.title),
        right = 100 + width,
        bottom = 100 + height,
        icon_size = spec.icon_size,
    )
}

/// [`ImageWriter`] using `hdiutil`.
///
/// The image is created read-write, mounted so Finder can record the window
/// layout, then converted to the requested format.
#[derive(Debug, Clone, Default)]
pub struct HdiutilImageWriter;

impl HdiutilImageWriter {
    pub fn new() -> Self {
        Self
    }

    /// Lay out the image contents in `staging`
    async fn stage(spec: &DmgSpecification, staging: &Path) -> Result<()> {
        for entry in &spec.contents {
            let dest = staging.join(entry_name(entry));
            match entry.kind {
                DmgEntryKind::Link => symlink(&entry.path, &dest)?,
                DmgEntryKind::File => {
                    let ditto = find_tool("ditto", "ditto ships with macOS")?;
                    run_tool("ditto", ditto, [entry.path.as_os_str(), dest.as_os_str()]).await?;
                }
            }
        }

        if let Some(icon) = &spec.icon {
            tokio::fs::copy(icon, staging.join(".VolumeIcon.icns")).await?;
        }
        if let Some(background) = &spec.background {
            let dir = staging.join(".background");
            tokio::fs::create_dir_all(&dir).await?;
            let name = background.file_name().map(PathBuf::from).unwrap_or_default();
            tokio::fs::copy(background, dir.join(name)).await?;
        }
        Ok(())
    }

    /// Apply the volume icon flag and the Finder layout to a mounted image
    async fn customize(spec: &DmgSpecification, mount_point: &Path) -> Result<()> {
        if spec.icon.is_some() {
            match which::which("SetFile") {
                Ok(set_file) => {
                    run_tool(
                        "SetFile",
                        set_file,
                        [OsStr::new("-a"), OsStr::new("C"), mount_point.as_os_str()],
                    )
                    .await?
                }
                Err(_) => warn!("SetFile not found, the volume icon will not be shown"),
            }
        }

        let osascript = find_tool("osascript", "osascript ships with macOS")?;
        let script = layout_script(spec);
        let layout = run_tool("osascript", osascript, ["-e", script.as_str()]).await;
        if let Err(e) = layout {
            // Layout is cosmetic; the image is still usable
            warn!(error = %e, "could not apply disk image window layout");
        }
        Ok(())
    }

    async fn detach(hdiutil: &Path, mount_point: &Path) -> Result<()> {
        // Finder writes .DS_Store asynchronously
        tokio::time::sleep(Duration::from_secs(2)).await;

        let detach = [OsStr::new("detach"), mount_point.as_os_str()];
        if let Err(e) = run_tool("hdiutil", hdiutil, detach).await {
            warn!(error = %e, "detach failed, forcing");
            let force = [OsStr::new("detach"), mount_point.as_os_str(), OsStr::new("-force")];
            run_tool("hdiutil", hdiutil, force).await?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn symlink(original: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(not(unix))]
fn symlink(_original: &Path, link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("cannot create {}: symlinks require a unix host", link.display()),
    ))
}

#[async_trait]
impl ImageWriter for HdiutilImageWriter {
    async fn write(&self, spec: &DmgSpecification, target: &Path) -> Result<()> {
        let hdiutil = find_tool("hdiutil", "hdiutil ships with macOS")?;
        debug!(
            spec = %serde_json::to_string(spec).unwrap_or_default(),
            "disk image specification"
        );

        let work = tempfile::Builder::new().prefix("macpack-dmg-").tempdir()?;
        let staging = work.path().join("contents");
        let mount_point = work.path().join("mount");
        let rw_image = work.path().join("rw.dmg");
        tokio::fs::create_dir_all(&staging).await?;
        tokio::fs::create_dir_all(&mount_point).await?;
        Self::stage(spec, &staging).await?;

        debug!(image = %rw_image.display(), "creating read-write image");
        let create: [&OsStr; 9] = [
            OsStr::new("create"),
            OsStr::new("-volname"),
            OsStr::new(&spec.title),
            OsStr::new("-srcfolder"),
            staging.as_os_str(),
            OsStr::new("-ov"),
            OsStr::new("-format"),
            OsStr::new("UDRW"),
            rw_image.as_os_str(),
        ];
        run_tool("hdiutil", &hdiutil, create).await?;

        let attach: [&OsStr; 6] = [
            OsStr::new("attach"),
            rw_image.as_os_str(),
            OsStr::new("-readwrite"),
            OsStr::new("-noverify"),
            OsStr::new("-mountpoint"),
            mount_point.as_os_str(),
        ];
        run_tool("hdiutil", &hdiutil, attach).await?;

        let customized = Self::customize(spec, &mount_point).await;
        Self::detach(&hdiutil, &mount_point).await?;
        customized?;

        info!(target = %target.display(), format = %spec.format, "writing disk image");
        let convert: [&OsStr; 7] = [
            OsStr::new("convert"),
            rw_image.as_os_str(),
            OsStr::new("-ov"),
            OsStr::new("-format"),
            OsStr::new(&spec.format),
            OsStr::new("-o"),
            target.as_os_str(),
        ];
        run_tool("hdiutil", &hdiutil, convert).await
    }
}
