// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs::{DirBuilder, Metadata, OpenOptions, Permissions};
use std::os::unix::ffi::OsStringExt;
use std::os::unix::fs::{
    DirBuilderExt,
    DirEntryExt,
    FileExt,
    FileTypeExt,
    MetadataExt,
    OpenOptionsExt,
    PermissionsExt,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::consts::*;
use fuser::{
    FileAttr,
    FileType,
    MountOption,
    ReplyAttr,
    ReplyData,
    ReplyDirectory,
    ReplyEmpty,
    ReplyEntry,
    ReplyOpen,
    ReplyStatfs,
    ReplyWrite,
    ReplyXattr,
    Request,
    TimeOrNow,
};
use nix::sys::stat::{Mode, SFlag};
use nix::unistd::AccessFlags;
use sudolog::{
    MountState,
    OsError,
    WriteRecord,
    check_caller,
    clear_setid_bits,
    clear_setid_bits_fd,
};

use crate::handles::{DirEntry, HandleTable, OpenDir, OpenFile};
use crate::host::{self, SetTime};
use crate::inodes::InodeTable;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./fuse_test.rs"]
mod fuse_test;

/// Options to configure the FUSE filesystem and
/// its behavior at runtime
#[derive(Debug, Clone)]
pub struct Config {
    /// How long the kernel may cache entries and attributes
    pub ttl: Duration,
    /// Mount options to be used when setting up
    pub mount_options: HashSet<MountOption>,
}

impl Config {
    /// The default attribute and entry cache timeout
    pub const DEFAULT_TTL: Duration = Duration::from_secs(1);
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl: Self::DEFAULT_TTL,
            mount_options: HashSet::new(),
        }
    }
}

/// The parts of a setattr request, each applied only when present.
#[derive(Debug, Default, Clone)]
struct SetAttr {
    mode: Option<u32>,
    uid: Option<u32>,
    gid: Option<u32>,
    size: Option<u64>,
    atime: Option<SetTime>,
    mtime: Option<SetTime>,
    fh: Option<u64>,
}

/// The reply to an extended attribute query.
#[derive(Debug, PartialEq, Eq)]
enum Xattr {
    /// The buffer size needed to hold the value
    Size(u32),
    Data(Vec<u8>),
}

impl Xattr {
    fn query(size: u32, read: impl FnOnce(&mut [u8]) -> Result<usize>) -> Result<Self> {
        if size == 0 {
            let needed = read(&mut [])?;
            return Ok(Self::Size(needed as u32));
        }
        let mut buf = vec![0; size as usize];
        let len = read(&mut buf)?;
        buf.truncate(len);
        Ok(Self::Data(buf))
    }
}

/// Serves requests against the backing directory of one mount.
struct Filesystem {
    state: Arc<MountState>,
    opts: Config,
    inodes: InodeTable,
    handles: HandleTable,
}

impl Filesystem {
    fn new(state: Arc<MountState>, opts: Config) -> Self {
        Self {
            state,
            opts,
            inodes: InodeTable::new(),
            handles: HandleTable::new(),
        }
    }

    /// The virtual and backing paths of an inode.
    fn resolve(&self, ino: u64) -> Result<(PathBuf, PathBuf)> {
        let path = self.inodes.path(ino).ok_or(Error::UnknownInode(ino))?;
        let backing = self.state.root().translate(&path);
        Ok((path, backing))
    }

    /// The virtual and backing paths of a name within a directory inode.
    fn resolve_child(&self, parent: u64, name: &OsStr) -> Result<(PathBuf, PathBuf)> {
        let path = self
            .inodes
            .child_path(parent, name)
            .ok_or(Error::UnknownInode(parent))?;
        let backing = self.state.root().translate(&path);
        Ok((path, backing))
    }

    /// Look up a backing path, handing out an inode for it.
    fn entry(&self, path: &Path, backing: &Path) -> Result<FileAttr> {
        let meta = std::fs::symlink_metadata(backing)?;
        let ino = self.inodes.remember(path);
        Ok(attr_from_metadata(ino, &meta))
    }

    fn attr(&self, ino: u64, backing: &Path) -> Result<FileAttr> {
        let meta = std::fs::symlink_metadata(backing)?;
        Ok(attr_from_metadata(ino, &meta))
    }
}

// these functions mirror the actual fuse ones and
// so we don't have much control over the shape
#[allow(clippy::too_many_arguments)]
impl Filesystem {
    fn getattr(&self, uid: u32, ino: u64) -> Result<FileAttr> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        self.attr(ino, &backing)
    }

    fn lookup(&self, uid: u32, parent: u64, name: &OsStr) -> Result<FileAttr> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("lookup {path:?}");
        self.entry(&path, &backing)
    }

    fn forget(&self, ino: u64, nlookup: u64) {
        self.inodes.forget(ino, nlookup);
    }

    fn setattr(&self, uid: u32, ino: u64, set: SetAttr) -> Result<FileAttr> {
        check_caller(uid)?;
        let (path, backing) = self.resolve(ino)?;
        tracing::trace!("setattr {path:?} {set:?}");

        if let Some(mode) = set.mode {
            std::fs::set_permissions(&backing, Permissions::from_mode(mode & 0o7777))?;
        }

        if set.uid.is_some() || set.gid.is_some() {
            clear_setid_bits(&backing)?;
            std::os::unix::fs::lchown(&backing, set.uid, set.gid)?;
        }

        if let Some(size) = set.size {
            match set.fh {
                Some(fh) => {
                    let handle = self.handles.file(fh)?;
                    clear_setid_bits_fd(handle.file())?;
                    handle.file().set_len(size)?;
                }
                None => {
                    clear_setid_bits(&backing)?;
                    nix::unistd::truncate(&backing, size as libc::off_t)?;
                }
            }
        }

        if set.atime.is_some() || set.mtime.is_some() {
            host::utimens(
                &backing,
                set.atime.unwrap_or(SetTime::Omit),
                set.mtime.unwrap_or(SetTime::Omit),
            )?;
        }

        self.attr(ino, &backing)
    }

    fn readlink(&self, uid: u32, ino: u64) -> Result<Vec<u8>> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        Ok(std::fs::read_link(&backing)?.into_os_string().into_vec())
    }

    fn mknod(&self, uid: u32, parent: u64, name: &OsStr, mode: u32, rdev: u32) -> Result<FileAttr> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("mknod {path:?} {mode:o}");
        let perm = Mode::from_bits_truncate(mode);
        match mode & libc::S_IFMT {
            libc::S_IFREG => {
                OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(mode & 0o7777)
                    .open(&backing)?;
            }
            libc::S_IFIFO => nix::unistd::mkfifo(&backing, perm)?,
            kind => nix::sys::stat::mknod(
                &backing,
                SFlag::from_bits_truncate(kind),
                perm,
                rdev as libc::dev_t,
            )?,
        }
        self.entry(&path, &backing)
    }

    fn mkdir(&self, uid: u32, parent: u64, name: &OsStr, mode: u32) -> Result<FileAttr> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("mkdir {path:?} {mode:o}");
        DirBuilder::new().mode(mode & 0o7777).create(&backing)?;
        self.entry(&path, &backing)
    }

    fn unlink(&self, uid: u32, parent: u64, name: &OsStr) -> Result<()> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("unlink {path:?}");
        std::fs::remove_file(&backing)?;
        self.inodes.detach(&path);
        Ok(())
    }

    fn rmdir(&self, uid: u32, parent: u64, name: &OsStr) -> Result<()> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("rmdir {path:?}");
        std::fs::remove_dir(&backing)?;
        self.inodes.detach(&path);
        Ok(())
    }

    fn symlink(&self, uid: u32, parent: u64, name: &OsStr, target: &Path) -> Result<FileAttr> {
        check_caller(uid)?;
        let (path, backing) = self.resolve_child(parent, name)?;
        tracing::trace!("symlink {path:?} -> {target:?}");
        std::os::unix::fs::symlink(target, &backing)?;
        self.entry(&path, &backing)
    }

    fn rename(
        &self,
        uid: u32,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
    ) -> Result<()> {
        check_caller(uid)?;
        let (from, from_backing) = self.resolve_child(parent, name)?;
        let (to, to_backing) = self.resolve_child(newparent, newname)?;
        tracing::trace!("rename {from:?} -> {to:?} [{flags:#x}]");
        if flags == 0 {
            std::fs::rename(&from_backing, &to_backing)?;
            self.inodes.rename(&from, &to);
            return Ok(());
        }
        host::rename_with_flags(&from_backing, &to_backing, flags)?;
        if flags & libc::RENAME_EXCHANGE != 0 {
            self.inodes.exchange(&from, &to);
        } else {
            self.inodes.rename(&from, &to);
        }
        Ok(())
    }

    fn link(&self, uid: u32, ino: u64, newparent: u64, newname: &OsStr) -> Result<FileAttr> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        let (path, new_backing) = self.resolve_child(newparent, newname)?;
        tracing::trace!("link {path:?}");
        std::fs::hard_link(&backing, &new_backing)?;
        self.entry(&path, &new_backing)
    }

    fn open(&self, uid: u32, ino: u64, flags: i32) -> Result<u64> {
        check_caller(uid)?;
        let (path, backing) = self.resolve(ino)?;
        let accmode = flags & libc::O_ACCMODE;
        let file = OpenOptions::new()
            .read(accmode == libc::O_RDONLY || accmode == libc::O_RDWR)
            .write(accmode == libc::O_WRONLY || accmode == libc::O_RDWR)
            .custom_flags(flags & !libc::O_ACCMODE)
            .open(&backing)?;
        let fh = self.handles.insert_file(OpenFile::new(file, path));
        tracing::trace!("open {ino} = {fh}");
        Ok(fh)
    }

    fn read(&self, uid: u32, fh: u64, offset: i64, size: u32) -> Result<Vec<u8>> {
        check_caller(uid)?;
        let handle = self.handles.file(fh)?;
        let offset = u64::try_from(offset).map_err(|_| Error::InvalidOffset(offset))?;
        let mut buf = vec![0; size as usize];
        let mut consumed = 0;
        while consumed < buf.len() {
            let count = handle
                .file()
                .read_at(&mut buf[consumed..], offset + consumed as u64)?;
            if count == 0 {
                // the end of the file has been reached
                break;
            }
            consumed += count;
        }
        buf.truncate(consumed);
        tracing::trace!("read {fh} = {consumed}/{size}");
        Ok(buf)
    }

    /// Write through a handle and mirror the written data to the collector.
    ///
    /// The mirror sees the whole buffer even when the backing write was
    /// short, and a failure to mirror never fails the write.
    fn write(&self, uid: u32, ino: u64, fh: u64, offset: i64, data: &[u8]) -> Result<u32> {
        check_caller(uid)?;
        let handle = self.handles.file(fh)?;
        let position = u64::try_from(offset).map_err(|_| Error::InvalidOffset(offset))?;

        let mut seq = handle.sequence();
        clear_setid_bits_fd(handle.file())?;
        let written = handle.file().write_at(data, position)?;

        let path = self
            .inodes
            .path(ino)
            .unwrap_or_else(|| handle.path().to_owned());
        let record = WriteRecord {
            path: path.as_os_str(),
            data,
            offset: position,
        };
        if let Ok(sent) = self.state.mirror().log_write(&record, &mut seq) {
            tracing::trace!("write {fh} = {written}/{} [{sent} datagrams]", data.len());
        }
        Ok(written as u32)
    }

    fn flush(&self, uid: u32, fh: u64) -> Result<()> {
        check_caller(uid)?;
        tracing::trace!("flush {fh}");
        Ok(())
    }

    fn release(&self, fh: u64) -> Result<()> {
        tracing::trace!("release {fh}");
        self.handles.remove_file(fh)
    }

    fn fsync(&self, uid: u32, fh: u64, datasync: bool) -> Result<()> {
        check_caller(uid)?;
        let handle = self.handles.file(fh)?;
        if datasync {
            handle.file().sync_data()?;
        } else {
            handle.file().sync_all()?;
        }
        Ok(())
    }

    fn opendir(&self, uid: u32, ino: u64) -> Result<u64> {
        check_caller(uid)?;
        let (path, backing) = self.resolve(ino)?;
        let this = std::fs::metadata(&backing)?;
        let parent = std::fs::metadata(backing.join("..")).unwrap_or_else(|_| this.clone());
        let mut entries = vec![
            DirEntry {
                name: OsString::from("."),
                kind: this.file_type(),
                ino: this.ino(),
            },
            DirEntry {
                name: OsString::from(".."),
                kind: parent.file_type(),
                ino: parent.ino(),
            },
        ];
        for entry in std::fs::read_dir(&backing)? {
            let entry = entry?;
            entries.push(DirEntry {
                kind: entry.file_type()?,
                ino: entry.ino(),
                name: entry.file_name(),
            });
        }
        let fh = self.handles.insert_dir(OpenDir::new(path, entries));
        tracing::trace!("opendir {ino} = {fh}");
        Ok(fh)
    }

    /// Page through a directory snapshot.
    ///
    /// Entries are given to `add` starting after `offset`, until it
    /// reports a full buffer. A buffer that cannot take even the first
    /// entry of the page is an error.
    fn readdir<F>(&self, uid: u32, fh: u64, offset: i64, mut add: F) -> Result<()>
    where
        F: FnMut(u64, i64, FileType, &OsStr) -> bool,
    {
        check_caller(uid)?;
        let dir = self.handles.dir(fh)?;
        let start = usize::try_from(offset).map_err(|_| Error::InvalidOffset(offset))?;
        tracing::trace!("readdir {:?} @{offset}", dir.path());
        for (index, entry) in dir.entries().iter().enumerate().skip(start) {
            let next_offset = index as i64 + 1;
            let buffer_full = add(entry.ino, next_offset, file_type(entry.kind), &entry.name);
            if buffer_full {
                if index == start {
                    return Err(Error::BufferFull);
                }
                break;
            }
        }
        Ok(())
    }

    fn releasedir(&self, fh: u64) -> Result<()> {
        tracing::trace!("releasedir {fh}");
        self.handles.remove_dir(fh)
    }

    fn fsyncdir(&self, uid: u32, fh: u64) -> Result<()> {
        check_caller(uid)?;
        tracing::trace!("fsyncdir {fh}");
        Ok(())
    }

    fn statfs(&self, uid: u32, ino: u64) -> Result<nix::sys::statvfs::Statvfs> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        Ok(nix::sys::statvfs::statvfs(&backing)?)
    }

    fn setxattr(&self, uid: u32, ino: u64, name: &OsStr, value: &[u8], flags: i32) -> Result<()> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        host::lsetxattr(&backing, name, value, flags)
    }

    fn getxattr(&self, uid: u32, ino: u64, name: &OsStr, size: u32) -> Result<Xattr> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        Xattr::query(size, |buf| host::lgetxattr(&backing, name, buf))
    }

    fn listxattr(&self, uid: u32, ino: u64, size: u32) -> Result<Xattr> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        Xattr::query(size, |buf| host::llistxattr(&backing, buf))
    }

    fn removexattr(&self, uid: u32, ino: u64, name: &OsStr) -> Result<()> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        host::lremovexattr(&backing, name)
    }

    fn access(&self, uid: u32, ino: u64, mask: i32) -> Result<()> {
        check_caller(uid)?;
        let (_, backing) = self.resolve(ino)?;
        nix::unistd::access(&backing, AccessFlags::from_bits_truncate(mask))?;
        Ok(())
    }
}

fn file_type(kind: std::fs::FileType) -> FileType {
    if kind.is_dir() {
        FileType::Directory
    } else if kind.is_symlink() {
        FileType::Symlink
    } else if kind.is_fifo() {
        FileType::NamedPipe
    } else if kind.is_char_device() {
        FileType::CharDevice
    } else if kind.is_block_device() {
        FileType::BlockDevice
    } else if kind.is_socket() {
        FileType::Socket
    } else {
        FileType::RegularFile
    }
}

fn attr_from_metadata(ino: u64, meta: &Metadata) -> FileAttr {
    let ctime = UNIX_EPOCH + Duration::new(meta.ctime().max(0) as u64, meta.ctime_nsec() as u32);
    FileAttr {
        ino,
        size: meta.size(),
        blocks: meta.blocks(),
        atime: meta.accessed().unwrap_or(UNIX_EPOCH),
        mtime: meta.modified().unwrap_or(UNIX_EPOCH),
        ctime,
        crtime: meta.created().unwrap_or(ctime),
        kind: file_type(meta.file_type()),
        perm: (meta.mode() & 0o7777) as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        rdev: meta.rdev() as u32,
        blksize: meta.blksize() as u32,
        flags: 0,
    }
}

fn set_time(time: TimeOrNow) -> SetTime {
    match time {
        TimeOrNow::Now => SetTime::Now,
        TimeOrNow::SpecificTime(time) => SetTime::Specific(time),
    }
}

/// Extract the ok value from a result, or reply with an error in FUSE
macro_rules! unwrap {
    ($reply:ident, $op:expr) => {{
        match $op {
            Ok(r) => r,
            Err(err) => err!($reply, err),
        }
    }};
}

/// Reply with an error to FUSE and return
///
/// Refusals by the access gate are answered without being logged.
macro_rules! err {
    ($reply:ident, $err:expr) => {{
        let err: Error = $err;
        let errno = err.os_error().unwrap_or(libc::EIO);
        if errno == libc::EIO {
            tracing::error!("{err:?}");
        } else if !err.is_permission_denied() {
            tracing::debug!("{err}");
        }
        $reply.error(errno);
        return;
    }};
}

/// Represents a connected FUSE session.
///
/// This implements the [`fuser::Filesystem`] trait, receives
/// all requests and runs each of them on the blocking pool of
/// the current tokio runtime.
pub struct Session {
    fs: Arc<Filesystem>,
}

impl Session {
    /// Construct a new session which mirrors the backing directory
    /// of the given mount state
    pub fn new(state: Arc<MountState>, opts: Config) -> Self {
        Self {
            fs: Arc::new(Filesystem::new(state, opts)),
        }
    }
}

impl fuser::Filesystem for Session {
    fn init(
        &mut self,
        _req: &Request<'_>,
        config: &mut fuser::KernelConfig,
    ) -> std::result::Result<(), libc::c_int> {
        // the write back cache must stay disabled, it would merge and
        // reorder writes before they can be mirrored
        const DESIRED: &[(&str, u64)] = &[
            ("FUSE_ASYNC_READ", FUSE_ASYNC_READ),
            ("FUSE_BIG_WRITES", FUSE_BIG_WRITES),
        ];
        let all_desired = DESIRED.iter().fold(0, |prev, (_, i)| prev | i);
        if let Err(unsupported) = config.add_capabilities(all_desired) {
            let rejected = DESIRED
                .iter()
                .filter_map(|d| (d.1 & unsupported != 0).then_some(d.0));
            for name in rejected {
                tracing::warn!("FUSE feature rejected: {name}");
            }
            if config.add_capabilities(all_desired & !unsupported).is_err() {
                tracing::warn!("FUSE capabilities could not be negotiated");
            }
        }
        let state = &self.fs.state;
        tracing::info!(
            root = ?state.root().path(),
            mountpoint = ?state.mountpoint(),
            collector = %state.collector(),
            hostname = state.mirror().hostname(),
            "Filesystem initialized"
        );
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(
            handles = self.fs.handles.len(),
            inodes = self.fs.inodes.len(),
            "Filesystem destroyed"
        );
    }

    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.lookup(uid, parent, &name));
            reply.entry(&fs.opts.ttl, &attr, 0);
        });
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.fs.forget(ino, nlookup);
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.getattr(uid, ino));
            reply.attr(&fs.opts.ttl, &attr);
        });
    }

    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let fs = Arc::clone(&self.fs);
        let caller = req.uid();
        let set = SetAttr {
            mode,
            uid,
            gid,
            size,
            atime: atime.map(set_time),
            mtime: mtime.map(set_time),
            fh,
        };
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.setattr(caller, ino, set));
            reply.attr(&fs.opts.ttl, &attr);
        });
    }

    fn readlink(&mut self, req: &Request<'_>, ino: u64, reply: ReplyData) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let target = unwrap!(reply, fs.readlink(uid, ino));
            reply.data(&target);
        });
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.mknod(uid, parent, &name, mode, rdev));
            reply.entry(&fs.opts.ttl, &attr, 0);
        });
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.mkdir(uid, parent, &name, mode));
            reply.entry(&fs.opts.ttl, &attr, 0);
        });
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.unlink(uid, parent, &name));
            reply.ok();
        });
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.rmdir(uid, parent, &name));
            reply.ok();
        });
    }

    fn symlink(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let link_name = link_name.to_owned();
        let target = target.to_owned();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.symlink(uid, parent, &link_name, &target));
            reply.entry(&fs.opts.ttl, &attr, 0);
        });
    }

    fn rename(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        let newname = newname.to_owned();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.rename(uid, parent, &name, newparent, &newname, flags));
            reply.ok();
        });
    }

    fn link(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let newname = newname.to_owned();
        tokio::task::spawn_blocking(move || {
            let attr = unwrap!(reply, fs.link(uid, ino, newparent, &newname));
            reply.entry(&fs.opts.ttl, &attr, 0);
        });
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let fh = unwrap!(reply, fs.open(uid, ino, flags));
            reply.opened(fh, 0);
        });
    }

    fn read(
        &mut self,
        req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let data = unwrap!(reply, fs.read(uid, fh, offset, size));
            reply.data(&data);
        });
    }

    fn write(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || {
            let written = unwrap!(reply, fs.write(uid, ino, fh, offset, &data));
            reply.written(written);
        });
    }

    fn flush(&mut self, req: &Request<'_>, _ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.flush(uid, fh));
            reply.ok();
        });
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.release(fh));
            reply.ok();
        });
    }

    fn fsync(&mut self, req: &Request<'_>, _ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.fsync(uid, fh, datasync));
            reply.ok();
        });
    }

    fn opendir(&mut self, req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let fh = unwrap!(reply, fs.opendir(uid, ino));
            reply.opened(fh, 0);
        });
    }

    fn readdir(
        &mut self,
        req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let result = fs.readdir(uid, fh, offset, |ino, next, kind, name| {
                reply.add(ino, next, kind, name)
            });
            unwrap!(reply, result);
            reply.ok();
        });
    }

    fn releasedir(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        reply: ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.releasedir(fh));
            reply.ok();
        });
    }

    fn fsyncdir(
        &mut self,
        req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _datasync: bool,
        reply: ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.fsyncdir(uid, fh));
            reply.ok();
        });
    }

    fn statfs(&mut self, req: &Request<'_>, ino: u64, reply: ReplyStatfs) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            let stat = unwrap!(reply, fs.statfs(uid, ino));
            reply.statfs(
                stat.blocks() as u64,
                stat.blocks_free() as u64,
                stat.blocks_available() as u64,
                stat.files() as u64,
                stat.files_free() as u64,
                stat.block_size() as u32,
                stat.name_max() as u32,
                stat.fragment_size() as u32,
            );
        });
    }

    fn setxattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        name: &OsStr,
        value: &[u8],
        flags: i32,
        _position: u32,
        reply: ReplyEmpty,
    ) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.setxattr(uid, ino, &name, &value, flags));
            reply.ok();
        });
    }

    fn getxattr(&mut self, req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            match unwrap!(reply, fs.getxattr(uid, ino, &name, size)) {
                Xattr::Size(size) => reply.size(size),
                Xattr::Data(data) => reply.data(&data),
            }
        });
    }

    fn listxattr(&mut self, req: &Request<'_>, ino: u64, size: u32, reply: ReplyXattr) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || match unwrap!(reply, fs.listxattr(uid, ino, size)) {
            Xattr::Size(size) => reply.size(size),
            Xattr::Data(data) => reply.data(&data),
        });
    }

    fn removexattr(&mut self, req: &Request<'_>, ino: u64, name: &OsStr, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.removexattr(uid, ino, &name));
            reply.ok();
        });
    }

    fn access(&mut self, req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let fs = Arc::clone(&self.fs);
        let uid = req.uid();
        tokio::task::spawn_blocking(move || {
            unwrap!(reply, fs.access(uid, ino, mask));
            reply.ok();
        });
    }
}
