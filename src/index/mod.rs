pub mod reviewers;
pub mod synonyms;
