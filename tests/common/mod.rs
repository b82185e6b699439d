//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

/// Stand-in for `cmake` that echoes each argument as `arg:<value>`.
pub const ECHO_ARGS: &str = r#"#!/bin/sh
for arg in "$@"; do
  echo "arg:$arg"
done
"#;

/// Like [`ECHO_ARGS`], but handles `-E env K=V... <cmd>` the way cmake does.
pub const ENV_AWARE: &str = r#"#!/bin/sh
if [ "$1" = "-E" ] && [ "$2" = "env" ]; then
  shift 2
  while [ $# -gt 0 ]; do
    case "$1" in
      *=*) export "$1"; shift ;;
      *) break ;;
    esac
  done
  exec "$@"
fi
echo "cc:$CC"
for arg in "$@"; do
  echo "arg:$arg"
done
"#;

/// Stand-in for `cmake` that complains on stderr and exits with 3.
pub const FAILING: &str = r#"#!/bin/sh
echo "CMake Error: no CMakeLists.txt" >&2
exit 3
"#;

/// Write an executable script called `fake-cmake` into `dir`.
pub fn fake_cmake(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("fake-cmake");
    std::fs::write(&path, script).expect("write fake cmake");
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}
