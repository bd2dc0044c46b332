//! Synthesis of the Python bootstrap that guards a target script.
//!
//! The bootstrap runs in this order:
//! 1. drop already-loaded blocked modules, then install a meta-path finder
//!    and an `__import__` hook that reject blocked roots;
//! 2. replace every resolvable blocked callable with a raising stand-in,
//!    wherever a loaded module binds that same object;
//! 3. run the target as `__main__`. A blocked import exits with 2, any other
//!    uncaught exception prints its traceback and exits with 1. `SystemExit`
//!    from the target passes through unchanged.
//!
//! The target is read, and `compile`, `exec`, `sys.exit` and the builtins the
//! revocation sweep relies on are captured before step 2, so revoking any of
//! them cannot break the bootstrap itself.

use std::path::Path;

use crate::policy::ExecutionProfile;

/// Exit code for a blocked import caught at runtime.
pub const BLOCKED_IMPORT_EXIT: i32 = 2;

/// Exit code for any other uncaught exception.
pub const UNCAUGHT_EXIT: i32 = 1;

const TEMPLATE: &str = r#"import builtins
import importlib
import importlib.abc
import os
import sys
import traceback

BLOCKED_IMPORTS = frozenset(@BLOCKED_IMPORTS@)
BLOCKED_CALLS = @BLOCKED_CALLS@
TARGET = @TARGET@
ORIGIN = @ORIGIN@


class BlockedImportError(ImportError):
    pass


class BlockedCallError(PermissionError):
    pass


def _check_import(name):
    root = name.split(".", 1)[0]
    if root in BLOCKED_IMPORTS:
        raise BlockedImportError("SandboxViolation: blocked import '%s'" % root)


class _BlockedFinder(importlib.abc.MetaPathFinder):
    def find_spec(self, fullname, path=None, target=None):
        _check_import(fullname)
        return None


_self = sys.modules[__name__]
_real_import = builtins.__import__
_compile = builtins.compile
_exec = builtins.exec
_exit = sys.exit
_callable, _getattr, _setattr, _vars, _list = callable, getattr, setattr, vars, list


def _guarded_import(name, globals=None, locals=None, fromlist=(), level=0):
    if level == 0 and name:
        _check_import(name)
    return _real_import(name, globals, locals, fromlist, level)


def _revoke(qualified):
    owner, _, attr = qualified.rpartition(".")
    try:
        module = importlib.import_module(owner or "builtins")
    except Exception:
        return
    original = _getattr(module, attr, None)
    if not _callable(original):
        return

    def _stand_in(*args, **kwargs):
        raise BlockedCallError("SandboxViolation: blocked call '%s'" % qualified)

    _setattr(module, attr, _stand_in)

    # The same object may be bound elsewhere: posix.system, or a module
    # that ran `from os import system` before the guard went in.
    for _mod in _list(sys.modules.values()):
        if _mod is _self:
            continue
        try:
            namespace = _vars(_mod)
        except TypeError:
            continue
        for _key, _value in _list(namespace.items()):
            if _value is original:
                try:
                    _setattr(_mod, _key, _stand_in)
                except Exception:
                    pass


try:
    with open(TARGET, "rb") as _fh:
        _source = _fh.read()
except OSError:
    traceback.print_exc()
    _exit(@UNCAUGHT_EXIT@)

for _name in list(sys.modules):
    if _name not in ("sys", "builtins") and _name.split(".", 1)[0] in BLOCKED_IMPORTS:
        del sys.modules[_name]

sys.meta_path.insert(0, _BlockedFinder())
builtins.__import__ = _guarded_import

for _qualified in BLOCKED_CALLS:
    _revoke(_qualified)

sys.path.insert(0, os.path.dirname(ORIGIN))
sys.argv = [ORIGIN]

_globals = {
    "__name__": "__main__",
    "__file__": ORIGIN,
    "__builtins__": builtins,
    "__package__": None,
    "__spec__": None,
    "__doc__": None,
}

try:
    _exec(_compile(_source, ORIGIN, "exec"), _globals)
except BlockedImportError as exc:
    sys.stderr.write(str(exc) + "\n")
    sys.stderr.flush()
    _exit(@BLOCKED_IMPORT_EXIT@)
except Exception:
    traceback.print_exc()
    sys.stderr.flush()
    _exit(@UNCAUGHT_EXIT@)
"#;

/// Build the wrapper source for a target script under a profile.
///
/// `target` is the file whose bytes are executed. `origin` is the path the
/// script believes it lives at: it becomes `__file__` and `sys.argv[0]`, its
/// directory goes first on `sys.path`, and tracebacks name it.
pub fn build_wrapper(target: &Path, origin: &Path, profile: &ExecutionProfile) -> String {
    TEMPLATE
        .replace("@BLOCKED_IMPORTS@", &py_list(profile.blocked_imports.iter()))
        .replace("@BLOCKED_CALLS@", &py_list(profile.blocked_calls.iter()))
        .replace("@TARGET@", &py_str(&target.to_string_lossy()))
        .replace("@ORIGIN@", &py_str(&origin.to_string_lossy()))
        .replace("@BLOCKED_IMPORT_EXIT@", &BLOCKED_IMPORT_EXIT.to_string())
        .replace("@UNCAUGHT_EXIT@", &UNCAUGHT_EXIT.to_string())
}

/// JSON string literals are valid Python string literals.
fn py_str(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn py_list<'a, I>(values: I) -> String
where
    I: Iterator<Item = &'a String>,
{
    let items: Vec<String> = values.map(|v| py_str(v)).collect();
    format!("[{}]", items.join(", "))
}
