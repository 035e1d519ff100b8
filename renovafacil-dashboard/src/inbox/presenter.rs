use chrono::{Datelike, NaiveDate, TimeZone};
use serde::Serialize;
use shared_types::{Conversation, Direction, Message};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::classifier::TestPhoneMatcher;
use crate::helpers::text::{contains_folded, fold_for_search};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationFilter {
    #[default]
    All,
    Unread,
    Incoming,
    Outgoing,
}

impl ConversationFilter {
    fn accepts(&self, conversation: &Conversation, unread: bool) -> bool {
        match self {
            ConversationFilter::All => true,
            ConversationFilter::Unread => unread,
            ConversationFilter::Incoming => conversation.direction == Direction::Incoming,
            ConversationFilter::Outgoing => conversation.direction == Direction::Outgoing,
        }
    }
}

impl FromStr for ConversationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todas" => Ok(ConversationFilter::All),
            "unread" | "no-leidas" => Ok(ConversationFilter::Unread),
            "incoming" | "entrantes" => Ok(ConversationFilter::Incoming),
            "outgoing" | "salientes" => Ok(ConversationFilter::Outgoing),
            other => Err(format!(
                "unknown filter '{}', expected all, unread, incoming or outgoing",
                other
            )),
        }
    }
}

impl fmt::Display for ConversationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationFilter::All => "all",
            ConversationFilter::Unread => "unread",
            ConversationFilter::Incoming => "incoming",
            ConversationFilter::Outgoing => "outgoing",
        };
        f.write_str(name)
    }
}

/// What the operator is currently looking at in the conversation list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub search: String,
    pub filter: ConversationFilter,
    /// Show only test conversations instead of only real ones
    pub show_test: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRow {
    pub conversation: Conversation,
    pub unread: bool,
    pub display_name: String,
}

/// Name shown for a conversation: backend name, then cached contact name,
/// then the masked phone, then the raw phone.
pub fn display_name(conversation: &Conversation, cached_name: Option<&str>) -> String {
    let non_blank = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };

    conversation
        .contact_name
        .as_deref()
        .and_then(non_blank)
        .or_else(|| cached_name.and_then(non_blank))
        .or_else(|| conversation.phone_masked.as_deref().and_then(non_blank))
        .unwrap_or_else(|| conversation.phone.clone())
}

/// `folded_needle` must come from `fold_for_search`
pub fn matches_search(
    conversation: &Conversation,
    cached_name: Option<&str>,
    folded_needle: &str,
) -> bool {
    if folded_needle.is_empty() {
        return true;
    }

    let fields = [
        Some(conversation.phone.as_str()),
        conversation.phone_masked.as_deref(),
        conversation.contact_name.as_deref(),
        cached_name,
        Some(conversation.last_message.as_str()),
    ];

    fields
        .into_iter()
        .flatten()
        .any(|field| contains_folded(field, folded_needle))
}

/// Applies the test-traffic split, search and filter, then orders unread
/// conversations first and newest first within each group.
pub fn present<F>(
    conversations: &[Conversation],
    query: &ConversationQuery,
    matcher: &TestPhoneMatcher,
    contact_names: &HashMap<String, String>,
    mut is_unread: F,
) -> Vec<ConversationRow>
where
    F: FnMut(&Conversation) -> bool,
{
    let needle = fold_for_search(query.search.trim());

    let mut rows: Vec<ConversationRow> = conversations
        .iter()
        .filter(|c| matcher.is_test(&c.phone) == query.show_test)
        .filter(|c| {
            let cached = contact_names.get(&c.phone).map(String::as_str);
            matches_search(c, cached, &needle)
        })
        .filter_map(|c| {
            let unread = is_unread(c);
            if !query.filter.accepts(c, unread) {
                return None;
            }
            let cached = contact_names.get(&c.phone).map(String::as_str);
            Some(ConversationRow {
                display_name: display_name(c, cached),
                conversation: c.clone(),
                unread,
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.unread.cmp(&a.unread).then_with(|| {
            b.conversation
                .last_message_time
                .cmp(&a.conversation.last_message_time)
        })
    });

    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    pub label: String,
    pub messages: Vec<Message>,
}

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub fn day_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        return "Hoy".to_string();
    }
    if today.pred_opt() == Some(date) {
        return "Ayer".to_string();
    }
    let month = MONTHS_ES[date.month0() as usize];
    format!("{} de {} de {}", date.day(), month, date.year())
}

/// Groups messages by calendar day in `tz`, oldest day first, each group
/// in chronological order.
pub fn group_messages_by_day<Tz: TimeZone>(
    messages: &[Message],
    today: NaiveDate,
    tz: &Tz,
) -> Vec<DayGroup> {
    let mut sorted = messages.to_vec();
    sorted.sort_by_key(|m| m.timestamp);

    let mut groups: Vec<DayGroup> = Vec::new();
    for message in sorted {
        let date = message.timestamp.with_timezone(tz).date_naive();
        match groups.last_mut() {
            Some(group) if group.date == date => group.messages.push(message),
            _ => groups.push(DayGroup {
                date,
                label: day_label(date, today),
                messages: vec![message],
            }),
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, FixedOffset, Utc};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn conversation(phone: &str, direction: Direction, minutes: i64) -> Conversation {
        Conversation {
            phone: phone.to_string(),
            phone_masked: None,
            contact_name: None,
            last_message: "Hola".to_string(),
            last_message_time: at(minutes),
            direction,
            message_count: 1,
        }
    }

    fn phones(rows: &[ConversationRow]) -> Vec<&str> {
        rows.iter().map(|r| r.conversation.phone.as_str()).collect()
    }

    #[test]
    fn test_unread_first_then_newest() {
        let conversations = vec![
            conversation("111", Direction::Outgoing, 50),
            conversation("222", Direction::Incoming, 10),
            conversation("333", Direction::Incoming, 40),
            conversation("444", Direction::Outgoing, 20),
        ];
        let unread = ["222", "333"];

        let rows = present(
            &conversations,
            &ConversationQuery::default(),
            &TestPhoneMatcher::default(),
            &HashMap::new(),
            |c| unread.contains(&c.phone.as_str()),
        );

        assert_eq!(phones(&rows), vec!["333", "222", "111", "444"]);
        assert!(rows[0].unread && rows[1].unread);
        assert!(!rows[2].unread && !rows[3].unread);
    }

    #[test]
    fn test_test_and_real_conversations_are_disjoint() {
        let conversations = vec![
            conversation("5491100000001", Direction::Incoming, 1),
            conversation("test_001", Direction::Incoming, 2),
            conversation("sim-42", Direction::Outgoing, 3),
            conversation("5491100000002", Direction::Outgoing, 4),
        ];
        let matcher = TestPhoneMatcher::default();
        let names = HashMap::new();

        let real = present(
            &conversations,
            &ConversationQuery::default(),
            &matcher,
            &names,
            |_| false,
        );
        let test = present(
            &conversations,
            &ConversationQuery {
                show_test: true,
                ..ConversationQuery::default()
            },
            &matcher,
            &names,
            |_| false,
        );

        assert_eq!(phones(&real), vec!["5491100000002", "5491100000001"]);
        assert_eq!(phones(&test), vec!["sim-42", "test_001"]);
        assert_eq!(real.len() + test.len(), conversations.len());
    }

    #[test]
    fn test_filters() {
        let conversations = vec![
            conversation("111", Direction::Incoming, 1),
            conversation("222", Direction::Outgoing, 2),
            conversation("333", Direction::Incoming, 3),
        ];
        let run = |filter| {
            let query = ConversationQuery {
                filter,
                ..ConversationQuery::default()
            };
            let rows = present(
                &conversations,
                &query,
                &TestPhoneMatcher::default(),
                &HashMap::new(),
                |c| c.phone == "333",
            );
            rows.into_iter()
                .map(|r| r.conversation.phone)
                .collect::<Vec<_>>()
        };

        assert_eq!(run(ConversationFilter::All), vec!["333", "222", "111"]);
        assert_eq!(run(ConversationFilter::Unread), vec!["333"]);
        assert_eq!(run(ConversationFilter::Incoming), vec!["333", "111"]);
        assert_eq!(run(ConversationFilter::Outgoing), vec!["222"]);
    }

    #[test]
    fn test_search_ignores_case_and_accents() {
        let mut maria = conversation("5491100000001", Direction::Incoming, 1);
        maria.contact_name = Some("María González".to_string());
        let other = conversation("5491100000002", Direction::Incoming, 2);
        let conversations = vec![maria, other];

        for search in ["maria", "MARÍA", "gonzalez", "Gonzá"] {
            let query = ConversationQuery {
                search: search.to_string(),
                ..ConversationQuery::default()
            };
            let rows = present(
                &conversations,
                &query,
                &TestPhoneMatcher::default(),
                &HashMap::new(),
                |_| false,
            );
            assert_eq!(phones(&rows), vec!["5491100000001"], "search {search:?}");
        }
    }

    #[test]
    fn test_search_uses_cached_contact_name() {
        let conversations = vec![conversation("5491100000001", Direction::Incoming, 1)];
        let mut names = HashMap::new();
        names.insert("5491100000001".to_string(), "José Pérez".to_string());
        let query = ConversationQuery {
            search: "jose".to_string(),
            ..ConversationQuery::default()
        };

        let rows = present(
            &conversations,
            &query,
            &TestPhoneMatcher::default(),
            &names,
            |_| false,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_name, "José Pérez");
    }

    #[test]
    fn test_search_by_phone_fragment() {
        let conversations = vec![
            conversation("5491100000001", Direction::Incoming, 1),
            conversation("5491199999999", Direction::Incoming, 2),
        ];
        let query = ConversationQuery {
            search: " 0001 ".to_string(),
            ..ConversationQuery::default()
        };
        let rows = present(
            &conversations,
            &query,
            &TestPhoneMatcher::default(),
            &HashMap::new(),
            |_| false,
        );
        assert_eq!(phones(&rows), vec!["5491100000001"]);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut c = conversation("5491100000001", Direction::Incoming, 1);
        assert_eq!(display_name(&c, None), "5491100000001");

        c.phone_masked = Some("549110***0001".to_string());
        assert_eq!(display_name(&c, None), "549110***0001");
        assert_eq!(display_name(&c, Some("Ana")), "Ana");

        c.contact_name = Some("  ".to_string());
        assert_eq!(display_name(&c, Some("Ana")), "Ana");

        c.contact_name = Some("Ana María".to_string());
        assert_eq!(display_name(&c, Some("Ana")), "Ana María");
    }

    #[test]
    fn test_filter_from_str() {
        assert_eq!("Unread".parse::<ConversationFilter>(), Ok(ConversationFilter::Unread));
        assert_eq!("salientes".parse::<ConversationFilter>(), Ok(ConversationFilter::Outgoing));
        assert!("sideways".parse::<ConversationFilter>().is_err());
    }

    fn message(id: i64, timestamp: DateTime<Utc>) -> Message {
        Message {
            id,
            timestamp,
            phone: "5491100000001".to_string(),
            direction: Direction::Incoming,
            message: format!("mensaje {id}"),
            message_type: "text".to_string(),
            contact_name: None,
        }
    }

    #[test]
    fn test_day_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(day_label(today, today), "Hoy");
        assert_eq!(
            day_label(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(), today),
            "Ayer"
        );
        assert_eq!(
            day_label(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), today),
            "1 de marzo de 2024"
        );
        assert_eq!(
            day_label(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), today),
            "31 de diciembre de 2023"
        );
    }

    #[test]
    fn test_grouping_is_chronological_and_partitions() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let messages = vec![
            message(4, day(15, 9)),
            message(1, day(13, 8)),
            message(3, day(14, 20)),
            message(2, day(13, 22)),
            message(5, day(15, 10)),
        ];

        let groups = group_messages_by_day(&messages, today, &Utc);

        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["13 de marzo de 2024", "Ayer", "Hoy"]);

        let ids: Vec<i64> = groups
            .iter()
            .flat_map(|g| g.messages.iter().map(|m| m.id))
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_grouping_uses_given_timezone() {
        let buenos_aires = FixedOffset::west_opt(3 * 3600).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        // 01:30 UTC on the 15th is still the 14th in Buenos Aires
        let messages = vec![message(1, Utc.with_ymd_and_hms(2024, 3, 15, 1, 30, 0).unwrap())];

        let groups = group_messages_by_day(&messages, today, &buenos_aires);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "Ayer");
    }

    #[test]
    fn test_regrouping_is_idempotent() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let messages: Vec<Message> = (0..6)
            .map(|i| message(i, Utc.with_ymd_and_hms(2024, 3, 12, 9, 0, 0).unwrap() + Duration::hours(i * 17)))
            .collect();

        let groups = group_messages_by_day(&messages, today, &Utc);
        let flattened: Vec<Message> = groups.iter().flat_map(|g| g.messages.clone()).collect();

        assert_eq!(group_messages_by_day(&flattened, today, &Utc), groups);
    }

    #[test]
    fn test_direction_filters_partition_visible_rows() {
        let conversations = vec![
            conversation("111", Direction::Incoming, 1),
            conversation("222", Direction::Outgoing, 2),
            conversation("333", Direction::Incoming, 3),
            conversation("test_9", Direction::Outgoing, 4),
        ];
        let rows_for = |filter| {
            let query = ConversationQuery {
                filter,
                ..ConversationQuery::default()
            };
            phones(&present(
                &conversations,
                &query,
                &TestPhoneMatcher::default(),
                &HashMap::new(),
                |c| c.is_incoming(),
            ))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
        };

        let all = rows_for(ConversationFilter::All);
        let incoming = rows_for(ConversationFilter::Incoming);
        let outgoing = rows_for(ConversationFilter::Outgoing);

        assert_eq!(incoming.len() + outgoing.len(), all.len());
        assert!(incoming.iter().all(|p| !outgoing.contains(p)));
        assert!(all.iter().all(|p| incoming.contains(p) || outgoing.contains(p)));
    }

    #[test]
    fn test_grouping_empty() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert!(group_messages_by_day(&[], today, &Utc).is_empty());
    }
}
