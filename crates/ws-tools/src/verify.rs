//! Human verification before a restore
//!
//! The caller retypes a random word built from Japanese syllables. This keeps
//! scripts from restoring workspaces in bulk by accident.

use rand::Rng;
use rand::seq::SliceRandom;
use std::io::{self, BufRead, Write};

const SYLLABLES: [&str; 48] = [
    "a", "i", "u", "e", "o", "ka", "ki", "ku", "ke", "ko", "sa", "shi", "su", "se", "so", "ta",
    "chi", "tsu", "te", "to", "na", "ni", "nu", "ne", "no", "ha", "hi", "fu", "he", "ho", "ma",
    "mi", "mu", "me", "mo", "ya", "yu", "yo", "ra", "ri", "ru", "re", "ro", "wa", "wi", "we",
    "wo", "n",
];

/// A word of three to seven syllables
pub fn challenge_word<R: Rng + ?Sized>(rng: &mut R) -> String {
    let count = rng.gen_range(3..=7);
    let mut word = String::new();
    for _ in 0..count {
        if let Some(syllable) = SYLLABLES.choose(rng) {
            word.push_str(syllable);
        }
    }
    word
}

/// Ask for `word` on `output` and read the answer from `input`
pub fn confirm<I: BufRead, O: Write>(input: &mut I, output: &mut O, word: &str) -> io::Result<bool> {
    write!(output, "to verify that you are human, please type '{word}': ")?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let human = line.trim_end_matches(['\n', '\r']) == word;

    if human {
        writeln!(output, "you are human")?;
    } else {
        writeln!(output, "not sure if you are human")?;
    }
    Ok(human)
}

/// Challenge the user on the terminal with a fresh word
pub fn ask_human() -> io::Result<bool> {
    let word = challenge_word(&mut rand::thread_rng());
    confirm(&mut io::stdin().lock(), &mut io::stderr(), &word)
}
