use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

/// Tokens this short or shorter never reach the embedding.
pub const MAX_SHORT_TOKEN_LEN: usize = 2;
/// Keywords must be at least this long.
pub const MIN_KEYWORD_LEN: usize = 4;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{M}\p{N}_]+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","also","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could",
            "did","do","does","doing","down","during",
            "each","either","else","every","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how","however",
            "i","if","in","into","is","it","its","itself",
            "just","like","made","many","me","might","more","most","much","must","my","myself",
            "neither","no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","shall","she","should","since","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","though","through","thus","to","too",
            "under","until","up","upon","very",
            "was","we","were","what","when","where","whether","which","while","who","whom","whose","why","will","with","within","without","would",
            "yet","you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

pub fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// NFKC-normalized, lowercased word runs (letters, marks, digits, `_`) in
/// encounter order, before any filtering.
fn words(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}

fn char_len(word: &str) -> usize { word.chars().count() }

/// Tokens feeding the embedding: every word longer than two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    words(text).into_iter().filter(|w| char_len(w) > MAX_SHORT_TOKEN_LEN).collect()
}

/// Tokens feeding keyword extraction: four characters or longer, stop words removed.
pub fn keyword_tokens(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| char_len(w) >= MIN_KEYWORD_LEN && !is_stopword(w))
        .collect()
}
