use super::FileIdentity;
use crate::error::{Error, Result};
use std::os::windows::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use winapi::um::fileapi::{
    CreateFileW, GetFileInformationByHandle, BY_HANDLE_FILE_INFORMATION, OPEN_EXISTING,
};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::winnt::{
    FILE_ATTRIBUTE_NORMAL, FILE_SHARE_DELETE, FILE_SHARE_READ, FILE_SHARE_WRITE,
};

/// Volume serial number and NTFS file index of `path`.
pub(super) fn identity(path: &Path) -> Result<FileIdentity> {
    let path_wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    unsafe {
        let handle = CreateFileW(
            path_wide.as_ptr(),
            0,
            FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE,
            ptr::null_mut(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL,
            ptr::null_mut(),
        );

        if handle == INVALID_HANDLE_VALUE || handle.is_null() {
            return Err(Error::io("open", path, std::io::Error::last_os_error()));
        }

        let mut info: BY_HANDLE_FILE_INFORMATION = std::mem::zeroed();
        let ok = GetFileInformationByHandle(handle, &mut info);
        let last_error = std::io::Error::last_os_error();
        CloseHandle(handle);
        if ok == 0 {
            return Err(Error::Identity {
                path: path.to_path_buf(),
                reason: last_error.to_string(),
            });
        }

        let file_index = ((info.nFileIndexHigh as u64) << 32) | info.nFileIndexLow as u64;
        Ok(FileIdentity::new(file_index, info.dwVolumeSerialNumber as u64))
    }
}
