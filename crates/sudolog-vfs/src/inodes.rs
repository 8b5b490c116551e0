// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[cfg(test)]
#[path = "./inodes_test.rs"]
mod inodes_test;

/// The inode number of the mount root, fixed by the FUSE protocol.
pub const ROOT_INODE: u64 = 1;

#[derive(Debug)]
struct Node {
    path: PathBuf,
    lookups: u64,
}

#[derive(Debug)]
struct Inner {
    next_inode: u64,
    nodes: HashMap<u64, Node>,
    by_path: HashMap<PathBuf, u64>,
}

/// Maps the kernel's inode numbers onto virtual paths.
///
/// The kernel addresses everything by inode, while all of the work
/// done by this filesystem is path based. Each path that the kernel
/// has looked up gets an inode that lives until the kernel forgets it.
/// Both directions are kept under one lock so that renames can move
/// whole subtrees atomically.
#[derive(Debug)]
pub struct InodeTable {
    inner: RwLock<Inner>,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    pub fn new() -> Self {
        let root = PathBuf::from("/");
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_INODE,
            Node {
                path: root.clone(),
                lookups: 1,
            },
        );
        let mut by_path = HashMap::new();
        by_path.insert(root, ROOT_INODE);
        Self {
            inner: RwLock::new(Inner {
                next_inode: ROOT_INODE + 1,
                nodes,
                by_path,
            }),
        }
    }

    /// The current virtual path of an inode.
    pub fn path(&self, ino: u64) -> Option<PathBuf> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.nodes.get(&ino).map(|n| n.path.clone())
    }

    /// The virtual path of `name` inside the directory inode `parent`.
    pub fn child_path(&self, parent: u64, name: &OsStr) -> Option<PathBuf> {
        self.path(parent).map(|p| p.join(name))
    }

    /// Record a kernel lookup of a path, returning its inode.
    ///
    /// Every call must eventually be balanced by a [`Self::forget`].
    pub fn remember(&self, path: &Path) -> u64 {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(ino) = inner.by_path.get(path).copied() {
            if let Some(node) = inner.nodes.get_mut(&ino) {
                node.lookups += 1;
                return ino;
            }
        }
        let ino = inner.next_inode;
        inner.next_inode += 1;
        inner.nodes.insert(
            ino,
            Node {
                path: path.to_owned(),
                lookups: 1,
            },
        );
        inner.by_path.insert(path.to_owned(), ino);
        ino
    }

    /// Drop `count` lookups of an inode, releasing it at zero.
    ///
    /// The root inode is never released.
    pub fn forget(&self, ino: u64, count: u64) {
        if ino == ROOT_INODE {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let Some(node) = inner.nodes.get_mut(&ino) else {
            return;
        };
        node.lookups = node.lookups.saturating_sub(count);
        if node.lookups > 0 {
            return;
        }
        if let Some(node) = inner.nodes.remove(&ino) {
            if inner.by_path.get(&node.path) == Some(&ino) {
                inner.by_path.remove(&node.path);
            }
        }
    }

    /// Stop resolving a path that was removed from the backing tree.
    ///
    /// The inode stays valid for the kernel until it is forgotten, but
    /// a new lookup of the same path will get a fresh inode.
    pub fn detach(&self, path: &Path) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.by_path.remove(path);
    }

    /// Move a path, and everything below it, to a new location.
    ///
    /// Anything previously known at the destination is detached.
    pub fn rename(&self, from: &Path, to: &Path) {
        if from == to {
            return;
        }
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = subtree(&inner, to);
        for (_, path) in replaced.iter() {
            inner.by_path.remove(path);
        }
        let moved = subtree(&inner, from);
        relocate(&mut inner, &moved, from, to);
    }

    /// Swap two paths, and everything below them.
    pub fn exchange(&self, a: &Path, b: &Path) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let under_a = subtree(&inner, a);
        let under_b = subtree(&inner, b);
        for (_, path) in under_a.iter().chain(under_b.iter()) {
            inner.by_path.remove(path);
        }
        relocate(&mut inner, &under_a, a, b);
        relocate(&mut inner, &under_b, b, a);
    }

    /// The number of inodes currently known, including the root.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.nodes.len()
    }
}

/// All resolvable entries at or below a path.
fn subtree(inner: &Inner, top: &Path) -> Vec<(u64, PathBuf)> {
    inner
        .by_path
        .iter()
        .filter(|(path, _)| path.starts_with(top))
        .map(|(path, ino)| (*ino, path.clone()))
        .collect()
}

fn relocate(inner: &mut Inner, entries: &[(u64, PathBuf)], from: &Path, to: &Path) {
    for (ino, path) in entries {
        let Ok(rest) = path.strip_prefix(from) else {
            continue;
        };
        let moved = if rest.as_os_str().is_empty() {
            to.to_owned()
        } else {
            to.join(rest)
        };
        inner.by_path.remove(path);
        if let Some(node) = inner.nodes.get_mut(ino) {
            node.path = moved.clone();
        }
        inner.by_path.insert(moved, *ino);
    }
}
