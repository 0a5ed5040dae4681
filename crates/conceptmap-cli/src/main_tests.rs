//! CLI tests

use clap::Parser;
use conceptmap_core::domain::MasteryStatus;

use crate::{Cli, Commands, NotesAction, OutputFormat, option_letter, parse_candidate, parse_status};

#[test]
fn test_parse_candidate_label_only() {
    let candidate = parse_candidate("Transformer").unwrap();
    assert_eq!(candidate.label, "Transformer");
    assert_eq!(candidate.status, MasteryStatus::New);
    assert!(candidate.description.is_none());
}

#[test]
fn test_parse_candidate_all_fields() {
    let candidate = parse_candidate(" LoRA | fuzzy | Low-rank adapters | extra ").unwrap();
    assert_eq!(candidate.label, "LoRA");
    assert_eq!(candidate.status, MasteryStatus::Fuzzy);
    // only the first two separators split
    assert_eq!(candidate.description.as_deref(), Some("Low-rank adapters | extra"));
}

#[test]
fn test_parse_candidate_empty_status_defaults() {
    let candidate = parse_candidate("Tokenizer||Splits text").unwrap();
    assert_eq!(candidate.status, MasteryStatus::New);
    assert_eq!(candidate.description.as_deref(), Some("Splits text"));
}

#[test]
fn test_parse_candidate_rejects_bad_input() {
    assert!(parse_candidate("  |known").is_err());
    assert!(parse_candidate("Thing|mastered").is_err());
}

#[test]
fn test_parse_status() {
    assert_eq!(parse_status("KNOWN").unwrap(), MasteryStatus::Known);
    assert!(parse_status("learned").is_err());
}

#[test]
fn test_option_letter() {
    assert_eq!(option_letter(0), 'A');
    assert_eq!(option_letter(3), 'D');
    assert_eq!(option_letter(40), '?');
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "conceptmap", "tree", "--expand-all", "--hide", "Math", "--hide", "Core", "--format",
        "json", "--owner", "alice",
    ])
    .unwrap();

    assert!(matches!(cli.format, OutputFormat::Json));
    assert_eq!(cli.owner.as_deref(), Some("alice"));
    match cli.command {
        Commands::Tree {
            expand_all, hide, ..
        } => {
            assert!(expand_all);
            assert_eq!(hide, vec!["Math", "Core"]);
        }
        _ => panic!("expected tree command"),
    }
}

#[test]
fn test_merge_requires_concepts() {
    assert!(Cli::try_parse_from(["conceptmap", "merge", "--category", "Core"]).is_err());
    let cli = Cli::try_parse_from([
        "conceptmap", "merge", "-c", "Core", "--concept", "A", "--concept", "B|known",
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Merge { ref concepts, .. } if concepts.len() == 2));
}

#[test]
fn test_notes_subcommands() {
    let cli = Cli::try_parse_from(["conceptmap", "notes", "set", "c1", "my notes"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Notes {
            action: NotesAction::Set { .. }
        }
    ));
}
