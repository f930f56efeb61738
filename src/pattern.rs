use anyhow::{Result, anyhow};

#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    tokens: Vec<Token>,
    globstars: usize,
    stars: usize,
    literal_prefix: usize,
}

#[derive(Debug, Clone)]
enum Token {
    Globstar,
    Segment(Vec<Piece>),
}

#[derive(Debug, Clone)]
enum Piece {
    Literal(String),
    Star,
    Question,
}

impl PathPattern {
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = if source.is_empty() {
            Vec::new()
        } else {
            source
                .split('/')
                .map(compile_segment)
                .collect::<Result<Vec<_>>>()
                .map_err(|e| anyhow!("invalid pattern {source:?}: {e}"))?
        };

        let globstars = tokens
            .iter()
            .filter(|t| matches!(t, Token::Globstar))
            .count();
        let stars = tokens
            .iter()
            .filter_map(|t| match t {
                Token::Segment(pieces) => Some(pieces),
                Token::Globstar => None,
            })
            .flatten()
            .filter(|p| matches!(p, Piece::Star))
            .count();
        let literal_prefix = source
            .find(['*', '?', '{'])
            .unwrap_or(source.len());

        Ok(Self {
            source: source.to_string(),
            tokens,
            globstars,
            stars,
            literal_prefix,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, path: &str) -> bool {
        // An empty path matches only the empty pattern.
        if path.is_empty() {
            return self.source.is_empty();
        }
        if self.source.is_empty() {
            return false;
        }
        let segments: Vec<&str> = path.split('/').collect();
        match_tokens(&self.tokens, &segments)
    }

    pub fn is_more_specific_than(&self, other: &PathPattern) -> bool {
        if self.globstars != other.globstars {
            return self.globstars < other.globstars;
        }
        if self.stars != other.stars {
            return self.stars < other.stars;
        }
        self.literal_prefix > other.literal_prefix
    }
}

fn compile_segment(raw: &str) -> Result<Token> {
    if raw == "**" {
        return Ok(Token::Globstar);
    }

    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '*' | '{' => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                if c == '{' {
                    // Path variables are accepted but not captured; the
                    // name is consumed and the piece degrades to `*`.
                    if !chars.by_ref().any(|c| c == '}') {
                        return Err(anyhow!("unclosed path variable in segment {raw:?}"));
                    }
                }
                pieces.push(Piece::Star);
            }
            '?' => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(Piece::Question);
            }
            '}' => return Err(anyhow!("unmatched '}}' in segment {raw:?}")),
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    Ok(Token::Segment(pieces))
}

fn match_tokens(tokens: &[Token], segments: &[&str]) -> bool {
    match tokens.split_first() {
        None => segments.is_empty(),
        Some((Token::Globstar, rest)) => {
            // `**` consumes zero or more whole segments, backtracking
            // until the remainder of the pattern matches.
            (0..=segments.len()).any(|taken| match_tokens(rest, &segments[taken..]))
        }
        Some((Token::Segment(pieces), rest)) => match segments.split_first() {
            Some((segment, tail)) => match_pieces(pieces, segment) && match_tokens(rest, tail),
            None => false,
        },
    }
}

fn match_pieces(pieces: &[Piece], segment: &str) -> bool {
    match pieces.split_first() {
        None => segment.is_empty(),
        Some((Piece::Literal(lit), rest)) => segment
            .strip_prefix(lit.as_str())
            .is_some_and(|tail| match_pieces(rest, tail)),
        Some((Piece::Question, rest)) => {
            let mut cs = segment.chars();
            cs.next().is_some() && match_pieces(rest, cs.as_str())
        }
        Some((Piece::Star, rest)) => {
            let mut tail = segment;
            loop {
                if match_pieces(rest, tail) {
                    return true;
                }
                let mut cs = tail.chars();
                if cs.next().is_none() {
                    return false;
                }
                tail = cs.as_str();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PathPattern;

    fn matches(pattern: &str, path: &str) -> bool {
        PathPattern::compile(pattern).unwrap().matches(path)
    }

    #[test]
    fn literals_match_themselves() {
        assert!(matches("/api/user", "/api/user"));
        assert!(!matches("/api/user", "/api/users"));
        assert!(!matches("/api/user", "/api"));
    }

    #[test]
    fn question_mark_matches_one_char_within_a_segment() {
        assert!(matches("/v?", "/v1"));
        assert!(matches("/v?", "/vX"));
        assert!(!matches("/v?", "/v"));
        assert!(!matches("/v?", "/v12"));
        assert!(!matches("/v?", "/v/"));
    }

    #[test]
    fn star_stays_inside_a_segment() {
        assert!(matches("/api/*", "/api/user"));
        assert!(matches("/api/*.json", "/api/posts.json"));
        assert!(matches("/api/*", "/api/"));
        assert!(!matches("/api/*", "/api/user/posts"));
        assert!(!matches("/*", "/a/b"));
    }

    #[test]
    fn globstar_spans_whole_segments() {
        assert!(matches("/api/**", "/api"));
        assert!(matches("/api/**", "/api/v1/user/42"));
        assert!(matches("/**/inner/**", "/svc/inner/sync"));
        assert!(matches("/**/inner/**", "/a/b/inner/c/d"));
        assert!(matches("/**/inner/**", "/inner/x"));
        assert!(!matches("/**/inner/**", "/svc/winner/sync"));
    }

    #[test]
    fn globstar_backtracks_across_candidates() {
        // The first `auth` segment has no trailing match; the matcher
        // must retry with the later one.
        assert!(matches("/api/**/auth/**", "/api/auth/x/auth/login"));
        assert!(matches("/api/**/auth/**", "/api/v1/auth/login"));
        assert!(matches("/api/**/auth/**", "/api/auth"));
        assert!(!matches("/api/**/auth/**", "/api/v1/login"));
        assert!(!matches("/api/**/auth/**", "/web/v1/auth/login"));
    }

    #[test]
    fn path_variables_accept_one_segment_portion() {
        assert!(matches("/api/{version}/auth/login", "/api/v1/auth/login"));
        assert!(matches("/user/{id}.json", "/user/42.json"));
        assert!(!matches("/api/{version}/auth", "/api/v1/v2/auth"));
        assert!(PathPattern::compile("/api/{broken").is_err());
    }

    #[test]
    fn empty_path_matches_only_empty_pattern() {
        assert!(matches("", ""));
        assert!(!matches("/**", ""));
        assert!(!matches("/", ""));
        assert!(!matches("", "/"));
    }

    #[test]
    fn trailing_slash_is_significant_without_globstar() {
        assert!(!matches("/api/user", "/api/user/"));
        assert!(matches("/api/user/", "/api/user/"));
        assert!(matches("/api/user/**", "/api/user/"));
    }

    #[test]
    fn root_globstar_matches_every_nonempty_path() {
        assert!(matches("/**", "/"));
        assert!(matches("/**", "/a"));
        assert!(matches("/**", "/a/b/c"));
    }

    #[test]
    fn root_does_not_match_inner_pattern() {
        assert!(!matches("/**/inner/**", "/"));
    }

    #[test]
    fn unicode_segments_match_by_char() {
        assert!(matches("/用户/*", "/用户/张三"));
        assert!(matches("/用?", "/用户"));
    }

    #[test]
    fn specificity_prefers_fewer_wildcards_then_longer_prefix() {
        let exact = PathPattern::compile("/api/user/profile").unwrap();
        let one_star = PathPattern::compile("/api/user/*").unwrap();
        let globstar = PathPattern::compile("/api/**").unwrap();
        let short_globstar = PathPattern::compile("/**").unwrap();

        assert!(exact.is_more_specific_than(&one_star));
        assert!(one_star.is_more_specific_than(&globstar));
        assert!(globstar.is_more_specific_than(&short_globstar));
        assert!(!short_globstar.is_more_specific_than(&globstar));
        assert!(!exact.is_more_specific_than(&exact));
    }

    #[test]
    fn matching_is_pure() {
        let pattern = PathPattern::compile("/api/**/auth/**").unwrap();
        for _ in 0..3 {
            assert!(pattern.matches("/api/v1/auth/login"));
            assert!(!pattern.matches("/api/v1/login"));
        }
    }
}
