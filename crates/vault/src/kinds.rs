//! The closed set of record kinds that carry integrity tags and decoys.
//!
//! Each kind declares its table, its column schema, which columns hold
//! encrypted values, which columns its decoys copy from the genuine row, and
//! the anonymity context used to pseudonymise its user column. Decoy synthesis
//! for each kind is registered in [`crate::decoy::synth::for_kind`].

use serde::{Deserialize, Serialize};

/// Value domain of a column, used to synthesise plausible decoy values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    PersonName,
    Email,
    Phone,
    City,
    /// Nine-digit national id with a valid check digit.
    IdentityNumber,
    /// `YYYY-MM-DD`.
    DateOfBirth,
    Address,
    /// Prose of roughly `target_len` characters.
    FreeText {
        target_len: usize,
    },
    /// Inclusive integer range.
    Integer {
        min: i64,
        max: i64,
    },
    Choice(&'static [&'static str]),
    /// Output of [`crate::identity::AnonymousIdentity::derive`].
    AnonymousId,
    /// Id of a row in another table.
    Reference,
    /// Keyed equality-lookup digest of another column.
    LookupHash {
        source: &'static str,
    },
}

/// One column of a record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    /// Stored as a `v1.<nonce>.<ciphertext>` string rather than plaintext.
    pub sensitive: bool,
}

const fn plain(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        sensitive: false,
    }
}

const fn secret(name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        sensitive: true,
    }
}

const PARTIES: &[&str] = &["independent", "green", "civic", "labour", "liberal", "unity"];
const ROLES: &[&str] = &["voter", "candidate"];

const USER_FIELDS: &[FieldSpec] = &[
    secret("email", FieldType::Email),
    plain("email_hash", FieldType::LookupHash { source: "email" }),
    secret("full_name", FieldType::PersonName),
    secret("identity_number", FieldType::IdentityNumber),
    secret("phone", FieldType::Phone),
    secret("date_of_birth", FieldType::DateOfBirth),
    plain("city", FieldType::City),
    secret("address", FieldType::Address),
    plain("role", FieldType::Choice(ROLES)),
];

const CANDIDATE_FIELDS: &[FieldSpec] = &[
    plain("user_id", FieldType::Reference),
    secret("display_name", FieldType::PersonName),
    secret("email", FieldType::Email),
    secret("phone", FieldType::Phone),
    plain("city", FieldType::City),
    plain("age", FieldType::Integer { min: 25, max: 85 }),
    plain("party", FieldType::Choice(PARTIES)),
    secret("vision", FieldType::FreeText { target_len: 280 }),
    secret("plan", FieldType::FreeText { target_len: 900 }),
];

const SUPPORTER_FIELDS: &[FieldSpec] = &[
    plain("supporter_id", FieldType::AnonymousId),
    plain("candidate_id", FieldType::Reference),
    secret("message", FieldType::FreeText { target_len: 120 }),
];

const QUIZ_ANSWER_FIELDS: &[FieldSpec] = &[
    plain("respondent_id", FieldType::AnonymousId),
    plain("question_id", FieldType::Integer { min: 1, max: 40 }),
    plain("answer", FieldType::Integer { min: 1, max: 5 }),
    plain("weight", FieldType::Integer { min: 1, max: 3 }),
];

const SELECTION_FIELDS: &[FieldSpec] = &[
    plain("voter_id", FieldType::AnonymousId),
    plain("candidate_id", FieldType::Reference),
    plain("rank", FieldType::Integer { min: 1, max: 10 }),
];

/// Every entity that is stored with an integrity tag and a decoy batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    User,
    Candidate,
    Supporter,
    QuizAnswer,
    Selection,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::User,
        RecordKind::Candidate,
        RecordKind::Supporter,
        RecordKind::QuizAnswer,
        RecordKind::Selection,
    ];

    /// Backing table name.
    pub fn table(self) -> &'static str {
        match self {
            RecordKind::User => "users",
            RecordKind::Candidate => "candidates",
            RecordKind::Supporter => "supporters",
            RecordKind::QuizAnswer => "quiz_answers",
            RecordKind::Selection => "selections",
        }
    }

    /// Semantic columns, excluding `id`, timestamps and the tag column.
    pub fn schema(self) -> &'static [FieldSpec] {
        match self {
            RecordKind::User => USER_FIELDS,
            RecordKind::Candidate => CANDIDATE_FIELDS,
            RecordKind::Supporter => SUPPORTER_FIELDS,
            RecordKind::QuizAnswer => QUIZ_ANSWER_FIELDS,
            RecordKind::Selection => SELECTION_FIELDS,
        }
    }

    /// Columns decoys copy verbatim from their genuine row, so that any
    /// lookup or grouping on them returns the whole batch.
    pub fn anchors(self) -> &'static [&'static str] {
        match self {
            RecordKind::User => &["email_hash"],
            RecordKind::Candidate => &["user_id"],
            RecordKind::Supporter => &["supporter_id", "candidate_id"],
            RecordKind::QuizAnswer => &["respondent_id", "question_id"],
            RecordKind::Selection => &["voter_id", "candidate_id"],
        }
    }

    /// Context mixed into the anonymous id of this kind's user column.
    pub fn anonymity_context(self) -> Option<&'static str> {
        match self {
            RecordKind::Supporter => Some("supporter"),
            RecordKind::QuizAnswer => Some("quiz_answers"),
            RecordKind::Selection => Some("selection"),
            RecordKind::User | RecordKind::Candidate => None,
        }
    }

    /// The column holding the anonymous id, if this kind has one.
    pub fn anonymous_field(self) -> Option<&'static str> {
        self.schema()
            .iter()
            .find(|f| f.ty == FieldType::AnonymousId)
            .map(|f| f.name)
    }

    /// Look up a column spec by name.
    pub fn field(self, name: &str) -> Option<&'static FieldSpec> {
        self.schema().iter().find(|f| f.name == name)
    }

    /// Lookup-hash columns paired with the column they digest.
    pub fn lookup_columns(self) -> impl Iterator<Item = (&'static str, &'static str)> {
        self.schema().iter().filter_map(|f| match f.ty {
            FieldType::LookupHash { source } => Some((f.name, source)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tables_are_unique() {
        let tables: HashSet<_> = RecordKind::ALL.iter().map(|k| k.table()).collect();
        assert_eq!(tables.len(), RecordKind::ALL.len());
    }

    #[test]
    fn anchors_exist_in_schema() {
        for kind in RecordKind::ALL {
            for anchor in kind.anchors() {
                assert!(kind.field(anchor).is_some(), "{kind:?}.{anchor}");
            }
        }
    }

    #[test]
    fn anonymity_context_iff_anonymous_field() {
        for kind in RecordKind::ALL {
            assert_eq!(
                kind.anonymity_context().is_some(),
                kind.anonymous_field().is_some(),
                "{kind:?}"
            );
        }
    }

    #[test]
    fn contexts_are_distinct() {
        let contexts: Vec<_> = RecordKind::ALL
            .iter()
            .filter_map(|k| k.anonymity_context())
            .collect();
        let unique: HashSet<_> = contexts.iter().collect();
        assert_eq!(unique.len(), contexts.len());
    }

    #[test]
    fn lookup_sources_are_sensitive_columns() {
        for kind in RecordKind::ALL {
            for (column, source) in kind.lookup_columns() {
                let spec = kind.field(source).expect(column);
                assert!(spec.sensitive, "{kind:?}.{source}");
            }
        }
    }

    #[test]
    fn user_lookup_column() {
        let cols: Vec<_> = RecordKind::User.lookup_columns().collect();
        assert_eq!(cols, [("email_hash", "email")]);
    }
}
