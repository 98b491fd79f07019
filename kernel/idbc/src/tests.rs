use pretty_assertions::assert_eq;

use super::*;

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|arg| (*arg).to_owned()).collect()
}

#[test]
fn no_arguments_means_help() {
    assert_eq!(Options::parse(&[]).unwrap(), Options::default());
    assert_eq!(Options::parse(&args(&["-h"])).unwrap().command, Command::Help);
}

#[test]
fn demo_with_output() {
    let options = Options::parse(&args(&["demo", "-o", "scene.idb"])).unwrap();
    assert_eq!(options.command, Command::Demo);
    assert_eq!(options.output, Some(PathBuf::from("scene.idb")));

    let options = Options::parse(&args(&["demo", "--output=other.idb"])).unwrap();
    assert_eq!(options.output, Some(PathBuf::from("other.idb")));
}

#[test]
fn dump_takes_a_path_and_flags() {
    let options = Options::parse(&args(&["dump", "-v", "scene.idb"])).unwrap();
    assert_eq!(
        options,
        Options {
            command: Command::Dump,
            input: Some(PathBuf::from("scene.idb")),
            output: None,
            verbose: true,
        }
    );
}

#[test]
fn bad_command_lines() {
    for line in [
        &["render"][..],
        &["verify"][..],
        &["dump", "a.idb", "b.idb"][..],
        &["demo", "--fast"][..],
        &["demo", "-o"][..],
    ] {
        assert!(
            matches!(Options::parse(&args(line)), Err(CliError::Usage(_))),
            "{line:?} should be refused"
        );
    }
}
