use std::error::Error;

use babble_gen::{Generator, Grammar, Lexicon};
use rand::SeedableRng;
use rand::rngs::StdRng;

const RULES: &str = include_str!("academia.rules");
const ROOTS: &str = include_str!("academia.json");

/// Invent academic fields from a table of word roots
///
/// Pass a number to fix the seed: `cargo run --example academia -- 7`
fn main() -> Result<(), Box<dyn Error>> {
    let grammar = Grammar::compile(RULES)?;
    let lexicon = Lexicon::from_json_str(ROOTS)?;
    lexicon.check(&grammar)?;

    let mut rng = match std::env::args().nth(1) {
        Some(seed) => StdRng::seed_from_u64(seed.parse()?),
        None => StdRng::from_entropy(),
    };

    let generator = Generator::new(&grammar).with_lexicon(&lexicon);

    println!("Newly founded academic fields:");
    for (i, field) in generator.generate_many("RESULT", 10, &mut rng)?.iter().enumerate() {
        println!("{}. {}", i + 1, field);
    }

    Ok(())
}
