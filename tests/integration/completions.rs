use clap::CommandFactory;
use clap_complete::{generate, Shell};
use std::io::BufWriter;

fn completions_for(shell: Shell) -> String {
    let mut buf = BufWriter::new(Vec::new());
    generate(shell, &mut devdock::cli::Cli::command(), "devdock", &mut buf);
    String::from_utf8(buf.into_inner().unwrap()).unwrap()
}

#[test]
fn completions_bash_generates_output() {
    let output = completions_for(Shell::Bash);
    assert!(!output.is_empty(), "bash completions should not be empty");
    assert!(output.contains("devdock"));
}

#[test]
fn completions_zsh_generates_output() {
    let output = completions_for(Shell::Zsh);
    assert!(!output.is_empty(), "zsh completions should not be empty");
    assert!(output.contains("devdock"));
}

#[test]
fn completions_fish_generates_output() {
    let output = completions_for(Shell::Fish);
    assert!(!output.is_empty(), "fish completions should not be empty");
    assert!(output.contains("devdock"));
}
