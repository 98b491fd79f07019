use std::io::Write;

use idb_ir::{IdFlag, IdTag, RefKind, WalkFlags};
use idb_lib::query::collect_references;
use idb_lib::Main;

use crate::CliError;

/// Print one line per ID: type, name, user count, state letters.
///
/// State letters: `F` fake user, `L` linked, `X` extra user.
pub fn dump_main(main: &mut Main, verbose: bool, out: &mut impl Write) -> Result<(), CliError> {
    for handle in main.all_handles() {
        let id = main.id(handle);
        let mut state = String::new();
        if id.flag.contains(IdFlag::FAKEUSER) {
            state.push('F');
        }
        if id.is_linked() {
            state.push('L');
        }
        if id.tag.contains(IdTag::EXTRAUSER) {
            state.push('X');
        }
        writeln!(
            out,
            "{} {:<24} us={:<3} {state}",
            id.code(),
            main.id_full_name(handle),
            id.us
        )?;

        if verbose {
            for (target, kind) in collect_references(main, handle, WalkFlags::INCLUDE_UI)? {
                writeln!(out, "    -> {:<20} {}", main.id(target).name.prefixed(), kind_label(kind))?;
            }
        }
    }
    Ok(())
}

fn kind_label(kind: RefKind) -> &'static str {
    if kind.contains(RefKind::LOOPBACK) {
        "owner"
    } else if kind.contains(RefKind::USER_ONE) {
        "ui"
    } else if kind.contains(RefKind::NEVER_NULL) {
        "user, required"
    } else if kind.is_counted() {
        "user"
    } else {
        "link"
    }
}
