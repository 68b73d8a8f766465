//! `@username` mention parsing for comment, reply and caption text.

/// Returns the usernames mentioned in `message`, without the leading `@`,
/// lowercased, in order of first appearance and with duplicates removed.
/// Usernames are stored lowercase, so `@Bob` and `@bob` name the same user.
///
/// A mention starts with `@` at the beginning of the text or after a
/// character that cannot be part of a word, so `bob@example.com` is not a
/// mention. Usernames consist of ASCII letters, digits, `_` and `.`; a
/// trailing `.` is treated as punctuation.
pub fn parse_mentions(message: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let chars: Vec<char> = message.chars().collect();

    let mut index = 0;
    while index < chars.len() {
        if chars[index] != '@' {
            index += 1;
            continue;
        }

        let preceded_by_word = index > 0 && is_username_char(chars[index - 1]);
        let start = index + 1;
        let mut end = start;
        while end < chars.len() && is_username_char(chars[end]) {
            end += 1;
        }

        if !preceded_by_word {
            let username: String = chars[start..end]
                .iter()
                .collect::<String>()
                .trim_end_matches('.')
                .to_ascii_lowercase();
            if !username.is_empty() && !mentions.contains(&username) {
                mentions.push(username);
            }
        }

        index = end.max(start);
    }

    mentions
}

/// Mentioned usernames that should receive a mention notification.
///
/// The author of the message never notifies themself, and the post author is
/// already covered by the comment notification.
pub fn mention_targets(message: &str, sender_username: &str, post_author_username: &str) -> Vec<String> {
    parse_mentions(message)
        .into_iter()
        .filter(|username| {
            !username.eq_ignore_ascii_case(sender_username)
                && !username.eq_ignore_ascii_case(post_author_username)
        })
        .collect()
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_mentions_are_collapsed() {
        assert_eq!(parse_mentions("hello @bob @bob"), vec!["bob"]);
    }

    #[test]
    fn keeps_first_appearance_order() {
        assert_eq!(
            parse_mentions("@zed, @amy and @zed again"),
            vec!["zed", "amy"]
        );
    }

    #[test]
    fn email_addresses_are_not_mentions() {
        assert!(parse_mentions("mail me at bob@example.com").is_empty());
    }

    #[test]
    fn trailing_period_is_punctuation() {
        assert_eq!(parse_mentions("thanks @john.doe."), vec!["john.doe"]);
    }

    #[test]
    fn lone_at_sign_is_ignored() {
        assert!(parse_mentions("meet @ noon @").is_empty());
    }

    #[test]
    fn targets_skip_sender_and_post_author() {
        let targets = mention_targets("@alice @carol @bob @bob", "alice", "carol");
        assert_eq!(targets, vec!["bob"]);
    }

    #[test]
    fn mentions_ignore_case() {
        assert_eq!(parse_mentions("hey @Bob and @bob"), vec!["bob"]);
        assert_eq!(mention_targets("hey @Bob and @bob", "alice", "carol"), vec!["bob"]);
        assert!(mention_targets("@ALICE @Carol", "alice", "carol").is_empty());
    }
}
