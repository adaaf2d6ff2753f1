//! In-memory fakes for the packaging seams

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::dmg::DmgSpecification;
use crate::error::{PackError, Result};
use crate::traits::{AppBuilder, ArchiveRequest, Archiver, BuildRequest, ImageWriter};

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    list.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(item);
}

fn snapshot<T: Clone>(list: &Mutex<Vec<T>>) -> Vec<T> {
    list.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// [`AppBuilder`] that records requests without touching the filesystem
#[derive(Debug, Default)]
pub struct FakeAppBuilder {
    requests: Mutex<Vec<BuildRequest>>,
}

impl FakeAppBuilder {
    pub fn requests(&self) -> Vec<BuildRequest> {
        snapshot(&self.requests)
    }
}

#[async_trait]
impl AppBuilder for FakeAppBuilder {
    async fn build(&self, request: &BuildRequest) -> Result<()> {
        push(&self.requests, request.clone());
        Ok(())
    }
}

/// [`ImageWriter`] that records target paths
#[derive(Debug, Default)]
pub struct FakeImageWriter {
    written: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl FakeImageWriter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn written(&self) -> Vec<PathBuf> {
        snapshot(&self.written)
    }
}

#[async_trait]
impl ImageWriter for FakeImageWriter {
    async fn write(&self, _spec: &DmgSpecification, target: &Path) -> Result<()> {
        if self.fail {
            return Err(PackError::ToolFailed {
                tool: "hdiutil".to_string(),
                reason: "resource busy".to_string(),
            });
        }
        push(&self.written, target.to_path_buf());
        Ok(())
    }
}

/// [`Archiver`] that records requests
#[derive(Debug, Default)]
pub struct FakeArchiver {
    requests: Mutex<Vec<ArchiveRequest>>,
}

impl FakeArchiver {
    pub fn requests(&self) -> Vec<ArchiveRequest> {
        snapshot(&self.requests)
    }
}

#[async_trait]
impl Archiver for FakeArchiver {
    async fn archive(&self, request: &ArchiveRequest) -> Result<()> {
        push(&self.requests, request.clone());
        Ok(())
    }
}
