use std::path::Path;
use sysinfo::System;

pub struct ProcessChecker;

impl ProcessChecker {
    /// True if any process runs one of `target_paths`. Matches on the full
    /// executable path, or on the file name when the process runs through a
    /// compatibility layer that reports a translated path.
    pub fn is_running<P: AsRef<Path>>(sys: &mut System, target_paths: &[P]) -> bool {
        sys.refresh_processes();

        sys.processes().values().any(|p| {
            let Some(exe_path) = p.exe() else {
                return false;
            };
            target_paths.iter().any(|target| {
                let target = target.as_ref();
                exe_path == target
                    || (target.file_name().is_some() && exe_path.file_name() == target.file_name())
            })
        })
    }
}
