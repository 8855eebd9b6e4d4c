use std::error::Error;

use babble_gen::{Generator, Grammar, GrammarBuilder, Lexicon, RuleExpr, Transform};
use rand::SeedableRng;
use rand::rngs::StdRng;

const RULES: &str = include_str!("technobabble.rules");
const ELEMENTS: &str = include_str!("technobabble.json");

fn main() -> Result<(), Box<dyn Error>> {
    let grammar = Grammar::compile(RULES)?;
    let lexicon = Lexicon::from_json_str(ELEMENTS)?;
    lexicon.check(&grammar)?;

    let mut rng = match std::env::args().nth(1) {
        Some(seed) => StdRng::seed_from_u64(seed.parse()?),
        None => StdRng::from_entropy(),
    };

    // Example 1: generate straight from the rule file
    let generator = Generator::new(&grammar).with_lexicon(&lexicon);
    println!("Generated technobabble:");
    for (i, item) in generator.generate_many("RESULT", 5, &mut rng)?.iter().enumerate() {
        println!("{}. {}", i + 1, item);
    }

    // Example 2: wrap the same vocabulary in orders built in code
    let orders = GrammarBuilder::new()
        .rule(
            "order",
            RuleExpr::sequence(vec![
                RuleExpr::choice(vec![
                    RuleExpr::literal("reroute "),
                    RuleExpr::literal("recalibrate "),
                    RuleExpr::literal("vent "),
                ]),
                RuleExpr::literal("the "),
                RuleExpr::reference("thing"),
                RuleExpr::literal(" through "),
                RuleExpr::reference("thing").transformed(Transform::IndefiniteArticle),
                RuleExpr::literal("!"),
            ])
            .transformed(Transform::Capitalize),
        )
        .rule(
            "thing",
            RuleExpr::sequence(vec![
                RuleExpr::lookup("Adjective"),
                RuleExpr::literal(" "),
                RuleExpr::lookup("Agent"),
            ]),
        )
        .build()?;

    println!("\nBridge orders:");
    println!("{}", orders);
    let generator = Generator::new(&orders).with_lexicon(&lexicon);
    for (i, order) in generator.generate_many("order", 3, &mut rng)?.iter().enumerate() {
        println!("{}. {}", i + 1, order);
    }

    Ok(())
}
