use babble_gen::{
    Generator, Grammar, GrammarBuilder, GrammarConfig, GrammarError, Lexicon, RuleExpr, Transform,
};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::rngs::mock::StepRng;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.rules");

    // Comments and blank lines are ignored.
    fs::write(
        &path,
        r#"
        # Test comment
        start   = "Hello, " subject
        subject = "world" | "Rust"
        "#,
    )
    .unwrap();

    let grammar = Grammar::from_file(&path).unwrap();
    assert!(grammar.has_rule("subject"));

    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..10 {
        let result = grammar.generate("start", &mut rng).unwrap();
        assert!(result == "Hello, world" || result == "Hello, Rust");
    }

    let err = Grammar::from_file(dir.path().join("missing.rules")).unwrap_err();
    assert!(matches!(err, GrammarError::Io(_)));
}

#[test]
fn test_hello_ada() {
    let grammar = babble_gen::compile(
        r#"
        greeting = "hello " name
        name     = "Ada" | "Grace"
        "#,
    )
    .unwrap();
    let text = babble_gen::generate(&grammar, "greeting", &mut StepRng::new(0, 0)).unwrap();
    assert_eq!(text, "hello Ada");
}

#[test]
fn test_fixed_repetition() {
    let grammar = babble_gen::compile(r#"word = "cat"{2,2}"#).unwrap();
    let text = grammar.generate("word", &mut StdRng::seed_from_u64(99)).unwrap();
    assert_eq!(text, "catcat");
}

#[test]
fn test_seeded_output_is_deterministic() {
    let source = r#"
        RESULT.cap = opener " " body "."
        opener = "we propose" | "this paper presents" | 2: "our results show"
        body   = noun (" and " noun)* | 3: "a " adj{1,2} noun
        adj    = "scalable " | "robust " | "novel "
        noun   = "caching" | "consensus" | "inference"
    "#;
    let grammar = Grammar::compile(source).unwrap();
    let recompiled = Grammar::compile(source).unwrap();

    let run = |grammar: &Grammar, seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..25)
            .map(|_| grammar.generate("RESULT", &mut rng).unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(run(&grammar, 2024), run(&grammar, 2024));
    assert_eq!(run(&grammar, 2024), run(&recompiled, 2024));
    assert!(run(&grammar, 2024).iter().all(|text| text.ends_with('.')));
}

#[test]
fn test_weighted_frequencies() {
    let grammar = Grammar::compile(r#"pick = 1: "a" | 2: "b" | 7: "c""#).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    const DRAWS: usize = 20_000;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for _ in 0..DRAWS {
        *counts.entry(grammar.generate("pick", &mut rng).unwrap()).or_default() += 1;
    }

    // Chi-square over three cells, two degrees of freedom. The 0.1% critical
    // value is 13.8, so 20 leaves generous room for a fixed seed.
    let chi_square: f64 = [("a", 0.1), ("b", 0.2), ("c", 0.7)]
        .iter()
        .map(|(option, share)| {
            let expected = DRAWS as f64 * share;
            let observed = *counts.get(*option).unwrap_or(&0) as f64;
            (observed - expected).powi(2) / expected
        })
        .sum();
    assert!(chi_square < 20.0, "chi-square {} for {:?}", chi_square, counts);
}

#[test]
fn test_repetition_counts_stay_in_bounds() {
    let grammar = Grammar::compile(
        r#"
        bounded = "ab"{2,5}
        many    = "ab"*
        some    = "ab"+
        atleast = "ab"{4,}
        "#,
    )
    .unwrap();
    let limit = GrammarConfig::default().open_repeat_limit as usize;
    let mut rng = StdRng::seed_from_u64(8);

    for (rule, min, max) in [
        ("bounded", 2, 5),
        ("many", 0, limit),
        ("some", 1, limit),
        ("atleast", 4, 4.max(limit)),
    ] {
        let mut seen = Vec::new();
        for _ in 0..200 {
            let text = grammar.generate(rule, &mut rng).unwrap();
            assert_eq!(text, "ab".repeat(text.len() / 2));
            let count = text.len() / 2;
            assert!(
                (min..=max).contains(&count),
                "{} repeated {} times",
                rule,
                count
            );
            seen.push(count);
        }
        assert!(seen.contains(&min), "{} never hit its minimum", rule);
        assert!(seen.contains(&max), "{} never hit its maximum", rule);
    }
}

#[test]
fn test_open_repeat_limit_is_configurable() {
    let config = GrammarConfig {
        open_repeat_limit: 6,
        ..GrammarConfig::default()
    };
    let grammar = Grammar::compile_with(r#"many = "x"*"#, &config).unwrap();
    assert_eq!(grammar.rule("many"), Some(&RuleExpr::repetition(RuleExpr::literal("x"), 0, 6)));
}

#[test]
fn test_literal_only_grammar_ignores_randomness() {
    let grammar = Grammar::compile(r#"s = "one" ", " "two" , ", three""#).unwrap();
    for seed in 0..20 {
        let text = grammar.generate("s", &mut StdRng::seed_from_u64(seed)).unwrap();
        assert_eq!(text, "one, two, three");
    }
    assert_eq!(
        grammar.generate("s", &mut StepRng::new(u64::MAX, 0)).unwrap(),
        "one, two, three"
    );
}

#[test]
fn test_undefined_reference() {
    let err = Grammar::compile(r#"start = "a" unknownRule"#).unwrap_err();
    match err {
        GrammarError::UndefinedRule { name, sites } => {
            assert_eq!(name, "unknownRule");
            assert_eq!(sites.len(), 1);
            assert_eq!(sites[0].rule, "start");
        }
        other => panic!("Unexpected error {:?}", other),
    }
}

#[test]
fn test_self_loop_hits_recursion_limit() {
    let grammar = Grammar::compile("loop = loop").unwrap();
    for seed in [0, 1, 42] {
        let err = grammar
            .generate("loop", &mut StdRng::seed_from_u64(seed))
            .unwrap_err();
        assert!(matches!(
            err,
            GrammarError::RecursionLimitExceeded { ref rule, limit: 100 } if rule == "loop"
        ));
        assert!(!err.is_compile_error());
    }
}

#[test]
fn test_grammar_survives_failed_generation() {
    let grammar = Grammar::compile("loop = loop\nok = \"fine\"").unwrap();
    let mut rng = StepRng::new(0, 0);

    assert!(grammar.generate("loop", &mut rng).is_err());
    assert!(grammar.generate("nope", &mut rng).is_err());
    assert_eq!(grammar.generate("ok", &mut rng).unwrap(), "fine");
}

#[test]
fn test_shared_across_threads() {
    let grammar = Grammar::compile(
        r#"
        RESULT = word ("-" word){0,3}
        word   = "flux" | "warp" | "phase"
        "#,
    )
    .unwrap();

    let outputs: Vec<Vec<String>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let grammar = &grammar;
                scope.spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    Generator::new(grammar)
                        .generate_many("RESULT", 50, &mut rng)
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    for (seed, output) in outputs.iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let expected = Generator::new(&grammar)
            .generate_many("RESULT", 50, &mut rng)
            .unwrap();
        assert_eq!(output, &expected);
    }
}

#[test]
fn test_builder_matches_source() {
    let built = GrammarBuilder::new()
        .rule(
            "greeting",
            RuleExpr::sequence(vec![RuleExpr::literal("hello "), RuleExpr::reference("name")]),
        )
        .rule(
            "name",
            RuleExpr::choice(vec![RuleExpr::literal("Ada"), RuleExpr::literal("Grace")]),
        )
        .build()
        .unwrap();
    let compiled = Grammar::compile("greeting = \"hello \" name\nname = \"Ada\" | \"Grace\"").unwrap();

    assert_eq!(built.to_string(), compiled.to_string());
    assert_eq!(built.rule("greeting"), compiled.rule("greeting"));

    let err = GrammarBuilder::new()
        .rule("a", RuleExpr::reference("b"))
        .build()
        .unwrap_err();
    assert!(matches!(err, GrammarError::UndefinedRule { name, .. } if name == "b"));
}

#[test]
fn test_lexicon_and_transforms() {
    let dir = TempDir::new().unwrap();
    let lexicon_path = dir.path().join("words.json");
    fs::write(
        &lexicon_path,
        r#"[
            {"Adjective": "elastic", "Noun": "archive"},
            {"Adjective": "quiet", "Noun": "ledger"}
        ]"#,
    )
    .unwrap();
    let lexicon = Lexicon::from_json_file(&lexicon_path).unwrap();

    let grammar = Grammar::compile(
        r#"
        RESULT.cap = phrase.a
        phrase     = [Adjective] " " [Noun]
        "#,
    )
    .unwrap();
    lexicon.check(&grammar).unwrap();
    assert_eq!(
        grammar.rule("RESULT"),
        Some(
            &RuleExpr::reference("phrase")
                .transformed(Transform::IndefiniteArticle)
                .transformed(Transform::Capitalize)
        )
    );

    let generator = Generator::new(&grammar).with_lexicon(&lexicon);
    assert_eq!(
        generator.generate("RESULT", &mut StepRng::new(0, 0)).unwrap(),
        "An elastic ledger"
    );

    let mut rng = StdRng::seed_from_u64(5);
    for text in generator.generate_many("RESULT", 20, &mut rng).unwrap() {
        assert!(text == "An elastic ledger" || text == "A quiet archive", "{}", text);
    }
}

#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"max_recursion_depth": 2}"#).unwrap();

    let config = GrammarConfig::from_json_file(&path).unwrap();
    assert_eq!(config.max_recursion_depth, 2);
    assert_eq!(config.open_repeat_limit, 3);
    assert!(config.avoid_lookup_repeats);

    let grammar = Grammar::compile("a = b\nb = c\nc = d\nd = \"deep\"").unwrap();
    let err = Generator::new(&grammar)
        .with_config(config)
        .generate("a", &mut StepRng::new(0, 0))
        .unwrap_err();
    assert!(matches!(err, GrammarError::RecursionLimitExceeded { rule, limit: 2 } if rule == "d"));

    fs::write(&path, r#"{"max_recursion_depth": 0}"#).unwrap();
    assert!(matches!(
        GrammarConfig::from_json_file(&path),
        Err(GrammarError::InvalidConfig(_))
    ));
}

#[test]
fn test_analysis_of_loaded_grammar() {
    let grammar = Grammar::compile(
        r#"
        RESULT = title
        title  = "On " topic | "Towards " topic
        topic  = "caching" | topic " and " topic
        unused = "never"
        "#,
    )
    .unwrap();
    let analysis = grammar.analyze("RESULT").unwrap();
    assert_eq!(analysis.unreachable, vec!["unused"]);
    assert_eq!(analysis.recursive, vec!["topic"]);
    assert!(analysis.non_terminating.is_empty());
}

#[test]
fn test_terminal_sequences_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("formats.rules");
    fs::write(
        &path,
        r#"
        RESULT = subject " " verb ("." | "!")
        subject.cap = "the " [Noun] | "everyone"
        verb = "agrees" | "objects"
        "#,
    )
    .unwrap();

    let grammar = Grammar::from_file(&path).unwrap();
    let formats = grammar.terminal_sequences("RESULT", 100).unwrap();
    assert_eq!(formats.len(), 8);
    assert_eq!(formats[0], "The [Noun] agrees.");
    assert_eq!(formats[7], "Everyone objects!");

    // Every generated text fits one of the listed shapes.
    let lexicon = Lexicon::from_json_str(r#"[{"Noun": "board"}]"#).unwrap();
    let generator = Generator::new(&grammar).with_lexicon(&lexicon);
    let mut rng = StdRng::seed_from_u64(11);
    for text in generator.generate_many("RESULT", 30, &mut rng).unwrap() {
        let shape = text.replace("board", "[Noun]");
        assert!(formats.contains(&shape), "{} not listed", text);
    }

    assert_eq!(grammar.terminal_sequences("RESULT", 3).unwrap(), formats[..3].to_vec());
}
