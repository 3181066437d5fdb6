//! Plausible column values for decoy rows, one synthesiser per record kind.
//!
//! Values are plaintext here; the generator encrypts sensitive columns
//! afterwards exactly as a genuine row would be encrypted.

use std::ops::RangeInclusive;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::Value;
use uuid::Builder;
use vault_common::Record;

use super::rng::DecoyRng;
use crate::crypto::DIGEST_LEN;
use crate::kinds::{FieldType, RecordKind};

/// Builds the plaintext semantic columns of one decoy.
pub type Synthesizer = fn(&mut DecoyRng) -> Record;

/// The synthesiser registered for `kind`.
pub fn for_kind(kind: RecordKind) -> Synthesizer {
    match kind {
        RecordKind::User => user,
        RecordKind::Candidate => candidate,
        RecordKind::Supporter => supporter,
        RecordKind::QuizAnswer => quiz_answer,
        RecordKind::Selection => selection,
    }
}

const FIRST_NAMES: &[&str] = &[
    "Noa", "Yossi", "Maya", "Daniel", "Tamar", "Omer", "Shira", "Itai", "Yael", "Amit", "Lior",
    "Rotem", "Eitan", "Hila", "Nadav", "Michal", "Ariel", "Dana", "Gal", "Avi", "Sara", "Yonatan",
    "Rina", "Ido", "Liat", "Ronen", "Adi", "Tal", "Neta", "Alon",
];

const LAST_NAMES: &[&str] = &[
    "Cohen", "Levi", "Mizrahi", "Peretz", "Biton", "Dahan", "Avraham", "Friedman", "Azoulay",
    "Katz", "Yosef", "David", "Amar", "Ohana", "Hadad", "Gabay", "Ben-David", "Shapiro", "Klein",
    "Rosen", "Malka", "Segal", "Golan", "Tal", "Barak",
];

const CITIES: &[&str] = &[
    "Jerusalem", "Tel Aviv", "Haifa", "Rishon LeZion", "Petah Tikva", "Ashdod", "Netanya",
    "Beersheba", "Holon", "Bnei Brak", "Ramat Gan", "Rehovot", "Ashkelon", "Bat Yam",
    "Herzliya", "Kfar Saba", "Hadera", "Modiin", "Nazareth", "Eilat",
];

const STREETS: &[&str] = &[
    "Herzl", "Rothschild", "Jabotinsky", "Ben Yehuda", "Weizmann", "Allenby", "HaNasi", "Bialik",
    "Dizengoff", "Sokolov", "HaPalmach", "Ahad HaAm", "King George", "Arlozorov", "HaGefen",
];

const EMAIL_DOMAINS: &[&str] = &[
    "gmail.com", "walla.co.il", "yahoo.com", "hotmail.com", "outlook.com", "bezeqint.net",
];

const WORDS: &[&str] = &[
    "community", "education", "transport", "housing", "budget", "residents", "youth", "parks",
    "safety", "local", "council", "improve", "invest", "support", "families", "future", "clean",
    "streets", "schools", "health", "access", "public", "services", "open", "transparent",
    "green", "plan", "together", "build", "neighbourhood", "small", "business", "culture",
    "sport", "seniors", "fair", "accountable", "listen", "every", "voice", "change", "water",
    "roads", "jobs", "digital", "libraries", "safe", "affordable", "better", "city",
];

fn user(rng: &mut DecoyRng) -> Record {
    let first = *rng.pick(FIRST_NAMES);
    let last = *rng.pick(LAST_NAMES);
    let mut record = fill(RecordKind::User, rng);
    record.insert("full_name", format!("{first} {last}"));
    record.insert("email", email_for(first, last, rng));
    record
}

fn candidate(rng: &mut DecoyRng) -> Record {
    let first = *rng.pick(FIRST_NAMES);
    let last = *rng.pick(LAST_NAMES);
    let mut record = fill(RecordKind::Candidate, rng);
    record.insert("display_name", format!("{first} {last}"));
    record.insert("email", email_for(first, last, rng));
    record
}

fn supporter(rng: &mut DecoyRng) -> Record {
    fill(RecordKind::Supporter, rng)
}

fn quiz_answer(rng: &mut DecoyRng) -> Record {
    fill(RecordKind::QuizAnswer, rng)
}

fn selection(rng: &mut DecoyRng) -> Record {
    fill(RecordKind::Selection, rng)
}

/// One independently drawn value per schema column.
pub fn fill(kind: RecordKind, rng: &mut DecoyRng) -> Record {
    kind.schema()
        .iter()
        .map(|spec| (spec.name, value(spec.ty, rng)))
        .collect()
}

/// Draw one value of the given type.
pub fn value(ty: FieldType, rng: &mut DecoyRng) -> Value {
    match ty {
        FieldType::PersonName => {
            let first = *rng.pick(FIRST_NAMES);
            let last = *rng.pick(LAST_NAMES);
            format!("{first} {last}").into()
        }
        FieldType::Email => {
            let first = *rng.pick(FIRST_NAMES);
            let last = *rng.pick(LAST_NAMES);
            email_for(first, last, rng).into()
        }
        FieldType::Phone => format!("05{}-{}", rng.below(10), rng.digits(7)).into(),
        FieldType::City => (*rng.pick(CITIES)).into(),
        FieldType::IdentityNumber => identity_number(rng).into(),
        FieldType::DateOfBirth => format!(
            "{:04}-{:02}-{:02}",
            rng.range(1940, 2006),
            rng.range(1, 12),
            rng.range(1, 28)
        )
        .into(),
        FieldType::Address => {
            format!("{} {} St, {}", rng.range(1, 199), rng.pick(STREETS), rng.pick(CITIES)).into()
        }
        FieldType::FreeText { target_len } => prose(target_len, rng).into(),
        FieldType::Integer { min, max } => rng.range(min, max).into(),
        FieldType::Choice(options) => (*rng.pick(options)).into(),
        FieldType::AnonymousId | FieldType::LookupHash { .. } => {
            let mut digest = [0u8; DIGEST_LEN];
            rng.fill_bytes(&mut digest);
            URL_SAFE_NO_PAD.encode(digest).into()
        }
        FieldType::Reference => random_uuid(rng).into(),
    }
}

/// Stretch or cut `text` until its byte length lies inside `target`.
///
/// Short values grow by appending further draws of the same type; long ones
/// are cut at a character boundary at a random point inside the range.
pub fn fit(
    ty: FieldType,
    text: String,
    target: RangeInclusive<usize>,
    rng: &mut DecoyRng,
) -> String {
    let (low, high) = (*target.start(), *target.end());
    let mut text = text;
    while text.len() < low {
        let extra = match ty {
            FieldType::FreeText { .. } => (*rng.pick(WORDS)).to_owned(),
            _ => match value(ty, rng) {
                Value::String(s) => s,
                other => other.to_string(),
            },
        };
        text.push(' ');
        text.push_str(&extra);
    }
    if text.len() > high {
        let mut cut = usize::try_from(rng.range(low as i64, high as i64)).unwrap_or(low);
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

/// A v4-shaped UUID drawn from the decoy sequence.
pub fn random_uuid(rng: &mut DecoyRng) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}

fn email_for(first: &str, last: &str, rng: &mut DecoyRng) -> String {
    let local = format!("{first}.{last}").to_lowercase().replace(' ', "");
    let domain = rng.pick(EMAIL_DOMAINS);
    if rng.chance(60) {
        format!("{local}{}@{domain}", rng.range(1, 99))
    } else {
        format!("{local}@{domain}")
    }
}

/// Eight random digits followed by the mod-10 check digit national ids use.
fn identity_number(rng: &mut DecoyRng) -> String {
    let body = rng.digits(8);
    let check = (10 - id_digit_sum(&body) % 10) % 10;
    format!("{body}{check}")
}

/// Sum of the digits of each digit multiplied by alternating weights 1, 2.
fn id_digit_sum(digits: &str) -> u32 {
    digits
        .bytes()
        .enumerate()
        .map(|(i, b)| {
            let product = u32::from(b - b'0') * if i % 2 == 0 { 1 } else { 2 };
            if product > 9 {
                product - 9
            } else {
                product
            }
        })
        .sum()
}

/// Sentences of filler words, within 70-130% of `target_len` characters.
fn prose(target_len: usize, rng: &mut DecoyRng) -> String {
    let goal = target_len * rng.range(70, 130) as usize / 100;
    let mut text = String::with_capacity(goal + 16);
    while text.len() < goal {
        if !text.is_empty() {
            text.push(' ');
        }
        let words = rng.range(6, 14);
        for i in 0..words {
            let word = *rng.pick(WORDS);
            if i == 0 {
                let mut chars = word.chars();
                if let Some(c) = chars.next() {
                    text.extend(c.to_uppercase());
                    text.push_str(chars.as_str());
                }
            } else {
                text.push(' ');
                text.push_str(word);
            }
        }
        text.push('.');
    }
    text
}
