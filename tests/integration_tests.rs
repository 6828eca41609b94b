//! Integration tests for satsplit.

use half::f16;
use ndarray::{Array3, ArrayView2};
use satsplit::{Error, Result, SaT, SaTOptions, ScoringModel, Token, Tokenizer, Weighting};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One token per non-whitespace character, offset by 10 to stay clear of
/// the sentinel ids.
struct CharTokenizer;

impl Tokenizer for CharTokenizer {
    fn bos_id(&self) -> u32 {
        0
    }

    fn eos_id(&self) -> u32 {
        2
    }

    fn pad_id(&self) -> u32 {
        1
    }

    fn encode(&self, text: &str) -> Result<Vec<Token>> {
        Ok(text
            .chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, c)| Token::new(c as u32 + 10, i, i + 1))
            .collect())
    }
}

fn id_of(c: char) -> i64 {
    c as i64 + 10
}

/// Scores '.' as a certain boundary, '!' as a weak one.
struct PunctModel {
    max_context: usize,
    calls: usize,
    fail: bool,
}

impl PunctModel {
    fn new() -> Self {
        Self {
            max_context: 512,
            calls: 0,
            fail: false,
        }
    }
}

impl ScoringModel for PunctModel {
    fn num_labels(&self) -> usize {
        1
    }

    fn max_context(&self) -> usize {
        self.max_context
    }

    fn downsampling_rate(&self) -> usize {
        1
    }

    fn infer(
        &mut self,
        input_ids: ArrayView2<'_, i64>,
        _attention_mask: ArrayView2<'_, f16>,
    ) -> Result<Array3<f32>> {
        self.calls += 1;
        if self.fail {
            return Err(Error::Inference("model crashed".to_string()));
        }

        let (rows, width) = input_ids.dim();
        Ok(Array3::from_shape_fn((rows, width, 1), |(r, c, _)| {
            let id = input_ids[[r, c]];
            if id == id_of('.') {
                10.0
            } else if id == id_of('!') {
                -1.0
            } else {
                -10.0
            }
        }))
    }
}

fn sat() -> SaT<CharTokenizer, PunctModel> {
    init_logging();
    SaT::new("sat-3l-sm", PunctModel::new(), CharTokenizer)
}

#[test]
fn test_split_end_to_end() {
    let mut sat = sat();
    let text = "Hello world. This is a test.";

    let sentences: Vec<&str> = sat.split(text, None).unwrap().collect();

    assert_eq!(sentences, vec!["Hello world. ", "This is a test."]);
    assert_eq!(sentences.concat(), text);
}

#[test]
fn test_split_strip_whitespace() {
    let mut sat = sat();
    let options = SaTOptions {
        strip_whitespace: true,
        ..SaTOptions::default()
    };

    let sentences: Vec<&str> = sat
        .split("Hello world.   This is a test.  ", Some(&options))
        .unwrap()
        .collect();

    assert_eq!(sentences, vec!["Hello world.", "This is a test."]);
}

#[test]
fn test_empty_input() {
    let mut sat = sat();

    assert_eq!(sat.predict_proba("", None).unwrap(), vec![f32::NEG_INFINITY]);
    assert_eq!(sat.split("", None).unwrap().count(), 0);
    assert_eq!(sat.split("  \n ", None).unwrap().count(), 0);
    assert_eq!(sat.split_paragraphs("", None).unwrap().count(), 0);
    assert_eq!(sat.model().calls, 0);
}

#[test]
fn test_probabilities_have_one_value_per_char() {
    let mut sat = sat();
    let text = "Grüße. Ciao.";

    let probs = sat.predict_proba(text, None).unwrap();

    assert_eq!(probs.len(), text.chars().count());
    assert!(probs[5] > 0.99);
    assert!(probs[11] > 0.99);
    assert!(probs[0] < 0.01);
}

#[test]
fn test_whitespace_removal_roundtrip() {
    let mut sat = sat();
    let options = SaTOptions {
        remove_whitespace_before_inference: true,
        ..SaTOptions::for_probabilities()
    };

    let probs = sat.predict_proba("a  b.", Some(&options)).unwrap();

    assert_eq!(probs.len(), 5);
    assert_eq!(probs[1], 0.0);
    assert_eq!(probs[2], 0.0);
    assert!(probs[4] > 0.99);
}

#[test]
fn test_paragraphs_nest_sentences() {
    let mut sat = sat();
    let options = SaTOptions {
        threshold: Some(0.1),
        strip_whitespace: true,
        ..SaTOptions::default()
    };

    let paragraphs: Vec<Vec<&str>> = sat
        .split_paragraphs("One! Two.\n\nThree! Four.", Some(&options))
        .unwrap()
        .map(|p| p.collect())
        .collect();

    assert_eq!(
        paragraphs,
        vec![vec!["One!", "Two."], vec!["Three!", "Four."]]
    );
}

#[test]
fn test_long_text_spans_many_windows() {
    let mut sat = sat();
    let text = "Ab. ".repeat(25);
    let options = SaTOptions {
        block_size: 16,
        stride: 8,
        batch_size: 4,
        ..SaTOptions::default()
    };

    let sentences: Vec<&str> = sat.split(&text, Some(&options)).unwrap().collect();

    assert_eq!(sentences.len(), 25);
    assert!(sentences.iter().all(|s| *s == "Ab. "));
    assert_eq!(sentences.concat(), text);
}

#[test]
fn test_padding_and_weighting_do_not_change_probabilities() {
    let mut sat = sat();
    let text = "Some words. More words here! And the end.";
    let base = SaTOptions {
        block_size: 10,
        stride: 3,
        batch_size: 4,
        ..SaTOptions::for_probabilities()
    };

    let plain = sat.predict_proba(text, Some(&base)).unwrap();
    let padded = sat
        .predict_proba(
            text,
            Some(&SaTOptions {
                pad_last_batch: true,
                ..base.clone()
            }),
        )
        .unwrap();
    let hat = sat
        .predict_proba(
            text,
            Some(&SaTOptions {
                weighting: Weighting::Hat,
                ..base.clone()
            }),
        )
        .unwrap();

    assert_eq!(plain, padded);
    for (a, b) in plain.iter().zip(&hat) {
        assert!((a - b).abs() < 1e-5);
    }
}

#[test]
fn test_huge_batch_size() {
    let mut sat = sat();
    let text = "A. B. C. D.";

    for pad_last_batch in [false, true] {
        let options = SaTOptions {
            batch_size: usize::MAX,
            block_size: 4,
            stride: 2,
            pad_last_batch,
            ..SaTOptions::default()
        };
        let sentences: Vec<&str> = sat.split(text, Some(&options)).unwrap().collect();
        assert_eq!(sentences, vec!["A. ", "B. ", "C. ", "D."]);
    }
}

#[test]
fn test_paragraphs_roundtrip_without_stripping() {
    let mut sat = sat();
    let text = "One! Two.\n\nThree! Four.";
    let options = SaTOptions {
        threshold: Some(0.1),
        split_on_input_newlines: false,
        ..SaTOptions::default()
    };

    let paragraphs: Vec<Vec<&str>> = sat
        .split_paragraphs(text, Some(&options))
        .unwrap()
        .map(|p| p.collect())
        .collect();

    assert_eq!(paragraphs.len(), 2);
    assert_eq!(paragraphs.concat().concat(), text);
}

#[test]
fn test_block_size_beyond_model_context_is_rejected() {
    init_logging();
    let mut model = PunctModel::new();
    model.max_context = 8;
    let mut sat = SaT::new("sat-3l", model, CharTokenizer);

    let result = sat.split("This text is longer than eight tokens.", None);

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn test_invalid_options_are_rejected() {
    let mut sat = sat();
    let texts = ["a."];

    for options in [
        SaTOptions {
            stride: 0,
            ..SaTOptions::default()
        },
        SaTOptions {
            batch_size: 0,
            ..SaTOptions::default()
        },
        SaTOptions {
            outer_batch_size: 0,
            ..SaTOptions::default()
        },
    ] {
        assert!(matches!(
            sat.split_batch(&texts, Some(&options)),
            Err(Error::InvalidConfig(_))
        ));
    }
}

#[test]
fn test_split_batch_keeps_order() {
    let mut sat = sat();
    let texts = ["A. B.", "", "C."];
    let options = SaTOptions {
        outer_batch_size: 2,
        ..SaTOptions::default()
    };

    let results: Vec<Vec<&str>> = sat
        .split_batch(&texts, Some(&options))
        .unwrap()
        .map(|sentences| sentences.unwrap().collect())
        .collect();

    assert_eq!(
        results,
        vec![vec!["A. ", "B."], Vec::<&str>::new(), vec!["C."]]
    );
}

#[test]
fn test_split_batch_is_lazy() {
    let mut sat = sat();
    let texts = vec!["One.".to_string(), "Two.".to_string(), "Three.".to_string()];
    let options = SaTOptions {
        outer_batch_size: 1,
        ..SaTOptions::default()
    };

    {
        let mut batch = sat.split_batch(&texts, Some(&options)).unwrap();
        let first: Vec<&str> = batch.next().unwrap().unwrap().collect();
        assert_eq!(first, vec!["One."]);
    }

    assert_eq!(sat.model().calls, 1);
}

#[test]
fn test_split_paragraphs_batch() {
    let mut sat = sat();
    let texts = ["A. B.", "C."];
    let options = SaTOptions {
        paragraph_threshold: 0.99,
        ..SaTOptions::default()
    };

    let results: Vec<Vec<Vec<&str>>> = sat
        .split_paragraphs_batch(&texts, Some(&options))
        .unwrap()
        .map(|paragraphs| paragraphs.unwrap().map(|p| p.collect()).collect())
        .collect();

    assert_eq!(results, vec![vec![vec!["A. "], vec!["B."]], vec![vec!["C."]]]);
}

#[test]
fn test_model_failure_surfaces_once() {
    init_logging();
    let mut model = PunctModel::new();
    model.fail = true;
    let mut sat = SaT::new("sat-3l-sm", model, CharTokenizer);
    let texts = ["a.", "b."];

    let mut batch = sat.split_batch(&texts, None).unwrap();

    assert!(matches!(batch.next(), Some(Err(Error::Inference(_)))));
    assert!(batch.next().is_none());
}

#[test]
fn test_default_threshold_follows_model_name() {
    init_logging();
    let sm = SaT::new("segment-any-text/sat-3l-sm", PunctModel::new(), CharTokenizer);
    let no_lookahead = SaT::new("sat-12l-no-limited-lookahead", PunctModel::new(), CharTokenizer);
    let plain = SaT::new("sat-3l", PunctModel::new(), CharTokenizer);

    assert_eq!(sm.threshold(), 0.25);
    assert_eq!(no_lookahead.threshold(), 0.01);
    assert_eq!(plain.threshold(), 0.025);
    assert_eq!(plain.model_name(), "sat-3l");
}

#[test]
fn test_explicit_threshold_overrides_default() {
    let mut sat = sat();
    // '!' scores about 0.27, just above the sm default of 0.25
    let text = "Wow! Fine.";

    let default: Vec<&str> = sat.split(text, None).unwrap().collect();
    let strict: Vec<&str> = sat
        .split(
            text,
            Some(&SaTOptions {
                threshold: Some(0.5),
                ..SaTOptions::default()
            }),
        )
        .unwrap()
        .collect();

    assert_eq!(default, vec!["Wow! ", "Fine."]);
    assert_eq!(strict, vec!["Wow! Fine."]);
}

/// Needs a real checkpoint: set `SATSPLIT_MODEL_DIR` to a directory holding
/// the ONNX export and `tokenizer.json`.
#[test]
#[ignore]
fn test_real_model() {
    init_logging();
    let dir = std::path::PathBuf::from(
        std::env::var("SATSPLIT_MODEL_DIR").expect("SATSPLIT_MODEL_DIR not set"),
    );
    let mut sat = SaT::from_path("sat-3l-sm", &dir, &dir.join("tokenizer.json")).unwrap();

    let options = SaTOptions {
        strip_whitespace: true,
        ..SaTOptions::default()
    };
    let sentences: Vec<&str> = sat
        .split("This is a test This is another test.", Some(&options))
        .unwrap()
        .collect();

    assert_eq!(sentences, vec!["This is a test", "This is another test."]);
}
