// Config field guard - rewrites the identity fields of a user-submitted config
// file (bind IP, port, max players) back to platform values.
//
// Every line that is not one of those fields is copied through untouched,
// including its line terminator.

use crate::games::GameType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The values the platform, not the user, controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedFields {
    pub ip_address: Option<String>,
    pub port: Option<u16>,
    pub max_players: u32,
}

/// What to do with a game identifier the guard has no grammar for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Refuse to guess.
    #[default]
    Reject,
    /// Use the generic case-insensitive key search.
    Generic,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GuardError {
    #[error("no config grammar for game type '{0}'")]
    UnknownGameType(String),
}

/// Rewrite the protected fields of `content` for `game_type`.
///
/// Known game types always have a grammar: most have a dedicated one, the
/// rest are routed to the generic key search. Identifiers that do not parse
/// as a game type follow `policy`.
pub fn protect_config_fields(
    content: &str,
    game_type: &str,
    fields: &ProtectedFields,
    policy: FallbackPolicy,
) -> Result<String, GuardError> {
    let game = match game_type.parse::<GameType>() {
        Ok(game) => game,
        Err(_) => {
            return match policy {
                FallbackPolicy::Generic => {
                    tracing::warn!(
                        "No grammar for game type '{}', using generic field search",
                        game_type
                    );
                    Ok(protect_generic(content, fields))
                }
                FallbackPolicy::Reject => Err(GuardError::UnknownGameType(game_type.to_string())),
            };
        }
    };
    Ok(protect_for_game(content, game, fields))
}

/// Rewrite with the grammar of a known game.
pub fn protect_for_game(content: &str, game: GameType, fields: &ProtectedFields) -> String {
    let ip = fields.ip_address.as_deref();
    let port = fields.port.map(|p| p.to_string());
    let players = fields.max_players.to_string();

    match game {
        GameType::Minecraft => rewrite_lines(content, |line| {
            rewrite_assignment(line, "server-ip", ip)
                .or_else(|| rewrite_assignment(line, "server-port", port.as_deref()))
                .or_else(|| rewrite_assignment(line, "max-players", Some(players.as_str())))
        }),
        GameType::ProjectZomboid => rewrite_lines(content, |line| {
            rewrite_assignment(line, "DefaultPort", port.as_deref())
                .or_else(|| rewrite_assignment(line, "MaxPlayers", Some(players.as_str())))
        }),
        GameType::ArkAscended | GameType::ArkEvolved => {
            let mut section = String::new();
            rewrite_lines(content, |line| {
                if let Some(name) = section_header(line) {
                    section = name.to_string();
                    return None;
                }
                match section.as_str() {
                    "SessionSettings" => rewrite_assignment(line, "ServerIP", ip)
                        .or_else(|| rewrite_assignment(line, "ServerPort", port.as_deref())),
                    "/Script/Engine.GameSession" => {
                        rewrite_assignment(line, "MaxPlayers", Some(players.as_str()))
                    }
                    _ => None,
                }
            })
        }
        GameType::Rust => rewrite_lines(content, |line| {
            rewrite_spaced(line, "server.ip", ip, SpacedValue::Quoted)
                .or_else(|| rewrite_spaced(line, "server.port", port.as_deref(), SpacedValue::Number))
                .or_else(|| {
                    rewrite_spaced(line, "server.maxplayers", Some(players.as_str()), SpacedValue::Number)
                })
        }),
        GameType::Cs2 => rewrite_lines(content, |line| {
            rewrite_spaced(line, "ip", ip, SpacedValue::Quoted)
                .or_else(|| rewrite_spaced(line, "hostport", port.as_deref(), SpacedValue::Number))
                .or_else(|| rewrite_spaced(line, "maxplayers", Some(players.as_str()), SpacedValue::Number))
        }),
        GameType::Palworld => rewrite_lines(content, |line| {
            apply_all(
                line,
                &[
                    &|l: &str| ip.and_then(|ip| rewrite_inline(l, "PublicIP", ip, InlineValue::Quoted)),
                    &|l: &str| {
                        port.as_deref()
                            .and_then(|p| rewrite_inline(l, "PublicPort", p, InlineValue::Number))
                    },
                    &|l: &str| rewrite_inline(l, "ServerPlayerMaxNum", &players, InlineValue::Number),
                ],
            )
        }),
        GameType::Satisfactory => rewrite_lines(content, |line| {
            apply_all(
                line,
                &[
                    &|l: &str| {
                        port.as_deref()
                            .and_then(|p| rewrite_inline(l, "GamePort", p, InlineValue::Number))
                    },
                    &|l: &str| rewrite_inline(l, "MaxPlayers", &players, InlineValue::Number),
                ],
            )
        }),
        GameType::SevenDaysToDie => rewrite_lines(content, |line| {
            apply_all(
                line,
                &[
                    &|l: &str| port.as_deref().and_then(|p| rewrite_xml_property(l, "ServerPort", p)),
                    &|l: &str| rewrite_xml_property(l, "ServerMaxPlayerCount", &players),
                ],
            )
        }),
        GameType::Valheim => match port.as_deref() {
            Some(p) => rewrite_lines(content, |line| rewrite_flag(line, "-port", p)),
            None => content.to_string(),
        },
        GameType::TheForest
        | GameType::SonsOfTheForest
        | GameType::ConanExiles
        | GameType::Dayz
        | GameType::Enshrouded => protect_generic(content, fields),
    }
}

type LineRule<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Run every rule over the line, each seeing the previous rule's output.
fn apply_all(line: &str, rules: &[LineRule<'_>]) -> Option<String> {
    let mut current: Option<String> = None;
    for rule in rules {
        let input = current.as_deref().unwrap_or(line);
        if let Some(next) = rule(input) {
            current = Some(next);
        }
    }
    current
}

const GENERIC_IP_KEYS: &[&str] = &["ip", "server-ip", "serverip", "publicip", "server.ip"];
const GENERIC_PORT_KEYS: &[&str] = &[
    "port",
    "server-port",
    "serverport",
    "publicport",
    "hostport",
    "gameport",
];
const GENERIC_PLAYER_KEYS: &[&str] = &[
    "max-players",
    "maxplayers",
    "server.maxplayers",
    "slotcount",
];

/// Best-effort search for `key = value` / `key: value` lines whose key looks
/// like an IP, port or player limit. The key text and separator are kept;
/// only the value changes.
pub fn protect_generic(content: &str, fields: &ProtectedFields) -> String {
    let players = fields.max_players.to_string();
    let port = fields.port.map(|p| p.to_string());

    rewrite_lines(content, |line| {
        let trimmed = line.trim_start();
        if is_comment(trimmed) || section_header(line).is_some() {
            return None;
        }
        let sep = trimmed.find(['=', ':'])?;
        let key = trimmed[..sep].trim().trim_matches('"').to_ascii_lowercase();
        let indent_len = line.len() - trimmed.len();
        let value_start = indent_len + sep + 1;
        let after = &line[value_start..];
        let value_offset = value_start + (after.len() - after.trim_start().len());
        let value = &line[value_offset..];

        let replaced = if GENERIC_IP_KEYS.contains(&key.as_str()) {
            let ip = fields.ip_address.as_deref()?;
            replace_scalar(value, ip)
        } else if GENERIC_PORT_KEYS.contains(&key.as_str()) {
            replace_digits(value, port.as_deref()?)
        } else if GENERIC_PLAYER_KEYS.contains(&key.as_str()) {
            replace_digits(value, &players)
        } else {
            None
        }?;
        Some(format!("{}{}", &line[..value_offset], replaced))
    })
}

/// Apply `f` to every line body; `None` keeps the line byte for byte.
fn rewrite_lines<F>(content: &str, mut f: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let (body, terminator) = split_terminator(line);
        match f(body) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(body),
        }
        out.push_str(terminator);
    }
    out
}

fn split_terminator(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with(';') || trimmed.starts_with("//")
}

fn section_header(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') && trimmed.len() >= 2 {
        Some(&trimmed[1..trimmed.len() - 1])
    } else {
        None
    }
}

/// `key=value` with the key at line start (after indentation).
fn rewrite_assignment(line: &str, key: &str, value: Option<&str>) -> Option<String> {
    let value = value?;
    let trimmed = line.trim_start();
    if is_comment(trimmed) {
        return None;
    }
    let eq = trimmed.find('=')?;
    if trimmed[..eq].trim_end() != key {
        return None;
    }
    let indent = &line[..line.len() - trimmed.len()];
    let after = &trimmed[eq + 1..];
    let pad = &after[..after.len() - after.trim_start().len()];
    Some(format!("{}{}={}{}", indent, &trimmed[..eq], pad, value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpacedValue {
    Quoted,
    Number,
}

/// `key "value"` or `key N`, separated by whitespace.
fn rewrite_spaced(line: &str, key: &str, value: Option<&str>, kind: SpacedValue) -> Option<String> {
    let value = value?;
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(key)?;
    let gap_len = rest.len() - rest.trim_start().len();
    if gap_len == 0 {
        return None;
    }
    let old = rest[gap_len..].trim_end();
    let was_quoted = old.len() >= 2 && old.starts_with('"') && old.ends_with('"');
    let bare = if was_quoted { &old[1..old.len() - 1] } else { old };
    if kind == SpacedValue::Number && (bare.is_empty() || !bare.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    if kind == SpacedValue::Quoted && !was_quoted {
        return None;
    }

    let indent = &line[..line.len() - trimmed.len()];
    let gap = &rest[..gap_len];
    let rendered = if was_quoted {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    };
    Some(format!("{}{}{}{}", indent, key, gap, rendered))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InlineValue {
    Quoted,
    Number,
}

/// Every `Key=N` / `Key="…"` occurrence inside a line, bounded on the left
/// by a non-identifier character.
fn rewrite_inline(line: &str, key: &str, value: &str, kind: InlineValue) -> Option<String> {
    let needle = format!("{}=", key);
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut changed = false;

    while let Some(pos) = rest.find(&needle) {
        let previous = if pos > 0 {
            rest[..pos].chars().next_back()
        } else {
            out.chars().next_back()
        };
        let bounded = previous.map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'));
        let value_start = pos + needle.len();
        let tail = &rest[value_start..];
        let old_len = match kind {
            InlineValue::Number => tail.bytes().take_while(|b| b.is_ascii_digit()).count(),
            InlineValue::Quoted => quoted_len(tail),
        };

        out.push_str(&rest[..value_start]);
        if bounded && old_len > 0 {
            match kind {
                InlineValue::Number => out.push_str(value),
                InlineValue::Quoted => {
                    out.push('"');
                    out.push_str(value);
                    out.push('"');
                }
            }
            rest = &tail[old_len..];
            changed = true;
        } else {
            rest = tail;
        }
    }
    out.push_str(rest);
    changed.then_some(out)
}

fn quoted_len(tail: &str) -> usize {
    if !tail.starts_with('"') {
        return 0;
    }
    match tail[1..].find('"') {
        Some(end) => end + 2,
        None => 0,
    }
}

/// `<property name="X" value="…"/>` - only the value attribute changes.
fn rewrite_xml_property(line: &str, name: &str, value: &str) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut changed = false;

    while let Some(start) = rest.find("<property") {
        let tag_end = rest[start..]
            .find('>')
            .map(|e| start + e + 1)
            .unwrap_or(rest.len());
        let tag = &rest[start..tag_end];
        out.push_str(&rest[..start]);

        let name_matches = attr_span(tag, "name").map(|(s, e)| &tag[s..e]) == Some(name);
        match attr_span(tag, "value").filter(|_| name_matches) {
            Some((s, e)) => {
                out.push_str(&tag[..s]);
                out.push_str(value);
                out.push_str(&tag[e..]);
                changed = true;
            }
            None => out.push_str(tag),
        }
        rest = &rest[tag_end..];
    }
    out.push_str(rest);
    changed.then_some(out)
}

/// Byte range of an attribute's quoted value inside a tag.
fn attr_span(tag: &str, attr: &str) -> Option<(usize, usize)> {
    let needle = format!("{}=\"", attr);
    let mut from = 0;
    while let Some(rel) = tag[from..].find(&needle) {
        let pos = from + rel;
        let start = pos + needle.len();
        let bounded = tag[..pos].chars().next_back().map_or(false, char::is_whitespace);
        if bounded {
            let end = start + tag[start..].find('"')?;
            return Some((start, end));
        }
        from = start;
    }
    None
}

/// A command-line flag followed by a number, e.g. `-port 2456`.
fn rewrite_flag(line: &str, flag: &str, value: &str) -> Option<String> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut changed = false;

    while let Some(pos) = rest.find(flag) {
        let previous = if pos > 0 {
            rest[..pos].chars().next_back()
        } else {
            out.chars().next_back()
        };
        let after_flag = &rest[pos + flag.len()..];
        let gap = after_flag.len() - after_flag.trim_start().len();
        let digits = after_flag[gap..]
            .bytes()
            .take_while(|b| b.is_ascii_digit())
            .count();

        let bounded = previous.map_or(true, char::is_whitespace);
        out.push_str(&rest[..pos + flag.len()]);
        if bounded && gap > 0 && digits > 0 {
            out.push_str(&after_flag[..gap]);
            out.push_str(value);
            rest = &after_flag[gap + digits..];
            changed = true;
        } else {
            rest = after_flag;
        }
    }
    out.push_str(rest);
    changed.then_some(out)
}

fn replace_digits(value: &str, replacement: &str) -> Option<String> {
    let (quote, inner) = match value.strip_prefix('"') {
        Some(inner) => ("\"", inner),
        None => ("", value),
    };
    let digits = inner.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    Some(format!("{}{}{}", quote, replacement, &inner[digits..]))
}

fn replace_scalar(value: &str, replacement: &str) -> Option<String> {
    let len = quoted_len(value);
    if len > 0 {
        return Some(format!("\"{}\"{}", replacement, &value[len..]));
    }
    let end = value
        .find(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .unwrap_or(value.len());
    Some(format!("{}{}", replacement, &value[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(ip: &str, port: u16, max_players: u32) -> ProtectedFields {
        ProtectedFields {
            ip_address: Some(ip.to_string()),
            port: Some(port),
            max_players,
        }
    }

    fn changed_lines(before: &str, after: &str) -> Vec<(String, String)> {
        before
            .split('\n')
            .zip(after.split('\n'))
            .filter(|(a, b)| a != b)
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_minecraft_changes_only_port_line() {
        let content = "#Minecraft server properties\n\
                       motd=A Serverwave Server\n\
                       difficulty=normal\n\
                       gamemode=survival\n\
                       server-port=1000\n\
                       pvp=true\n\
                       level-seed=\n\
                       view-distance=10\n\
                       enable-rcon=false\n\
                       spawn-protection=16\n\
                       online-mode=true\n";
        let protected = ProtectedFields {
            ip_address: None,
            port: Some(25565),
            max_players: 20,
        };
        let result = protect_config_fields(content, "MINECRAFT", &protected, FallbackPolicy::Reject).unwrap();

        assert_eq!(
            changed_lines(content, &result),
            vec![("server-port=1000".to_string(), "server-port=25565".to_string())]
        );
        assert_eq!(result.len(), content.len() + 1);
    }

    #[test]
    fn test_minecraft_all_fields() {
        let content = "server-ip=1.2.3.4\nmax-players=500\n  server-port = 1\n";
        let result = protect_for_game(content, GameType::Minecraft, &fields("10.0.0.5", 25570, 20));
        assert_eq!(result, "server-ip=10.0.0.5\nmax-players=20\n  server-port = 25570\n");
    }

    #[test]
    fn test_preserves_crlf_and_missing_trailing_newline() {
        let content = "motd=hi\r\nmax-players=99\r\n# max-players=1\r\nlast=line";
        let result = protect_for_game(content, GameType::Minecraft, &fields("1.1.1.1", 25565, 10));
        assert_eq!(result, "motd=hi\r\nmax-players=10\r\n# max-players=1\r\nlast=line");
    }

    #[test]
    fn test_ark_scoped_to_sections() {
        let content = "[ServerSettings]\n\
                       ServerPort=1\n\
                       [SessionSettings]\n\
                       SessionName=My Ark\n\
                       ServerIP=9.9.9.9\n\
                       ServerPort=7777\n\
                       [/Script/Engine.GameSession]\n\
                       MaxPlayers=300\n";
        let result = protect_for_game(content, GameType::ArkAscended, &fields("10.1.1.1", 27015, 70));
        assert_eq!(
            result,
            "[ServerSettings]\n\
             ServerPort=1\n\
             [SessionSettings]\n\
             SessionName=My Ark\n\
             ServerIP=10.1.1.1\n\
             ServerPort=27015\n\
             [/Script/Engine.GameSession]\n\
             MaxPlayers=70\n"
        );
    }

    #[test]
    fn test_rust_spaced_grammar() {
        let content = "server.hostname \"My Rust\"\nserver.ip \"0.0.0.0\"\nserver.port 1234\nserver.maxplayers 5000\nserver.ipv6 \"::\"\n";
        let result = protect_for_game(content, GameType::Rust, &fields("10.0.0.2", 28015, 100));
        assert_eq!(
            result,
            "server.hostname \"My Rust\"\nserver.ip \"10.0.0.2\"\nserver.port 28015\nserver.maxplayers 100\nserver.ipv6 \"::\"\n"
        );
    }

    #[test]
    fn test_cs2_spaced_grammar() {
        let content = "// server.cfg\n\
                       hostname \"My CS2\"\n\
                       ip \"0.0.0.0\"\n\
                       ipv6 \"::\"\n\
                       hostport 27015\n\
                       maxplayers 64\n\
                       // maxplayers 10\n\
                       maxplayers_override 20\n\
                       sv_cheats 0\n";
        let result = protect_for_game(content, GameType::Cs2, &fields("10.4.4.4", 27100, 12));
        assert_eq!(
            changed_lines(content, &result),
            vec![
                ("ip \"0.0.0.0\"".to_string(), "ip \"10.4.4.4\"".to_string()),
                ("hostport 27015".to_string(), "hostport 27100".to_string()),
                ("maxplayers 64".to_string(), "maxplayers 12".to_string()),
            ]
        );
        assert!(result.starts_with("// server.cfg\nhostname \"My CS2\"\n"));
        assert!(result.ends_with("// maxplayers 10\nmaxplayers_override 20\nsv_cheats 0\n"));
    }

    #[test]
    fn test_zomboid_ini_grammar() {
        let content = "# Project Zomboid server settings\n\
                       PVP=true\n\
                       PauseEmpty=true\n\
                       DefaultPort=16261\n\
                       UDPPort=16262\n\
                       MaxPlayers=32\n\
                       # MaxPlayers=1\n\
                       PublicName=My PZ Server\n";
        let result = protect_for_game(content, GameType::ProjectZomboid, &fields("10.5.5.5", 16300, 8));
        assert_eq!(
            changed_lines(content, &result),
            vec![
                ("DefaultPort=16261".to_string(), "DefaultPort=16300".to_string()),
                ("MaxPlayers=32".to_string(), "MaxPlayers=8".to_string()),
            ]
        );
        assert_eq!(result.len(), content.len() - 1);
        assert!(result.contains("\n# MaxPlayers=1\nPublicName=My PZ Server\n"));
    }

    #[test]
    fn test_seven_days_xml_properties() {
        let content = "<ServerSettings>\n\
                       \t<property name=\"ServerName\" value=\"My Server\"/>\n\
                       \t<property name=\"ServerPort\" value=\"1\"/>\n\
                       \t<property name=\"ServerMaxPlayerCount\" value=\"64\"/>\n\
                       </ServerSettings>\n";
        let result = protect_for_game(content, GameType::SevenDaysToDie, &fields("1.1.1.1", 26900, 8));
        assert!(result.contains("\t<property name=\"ServerPort\" value=\"26900\"/>\n"));
        assert!(result.contains("\t<property name=\"ServerMaxPlayerCount\" value=\"8\"/>\n"));
        assert!(result.contains("\t<property name=\"ServerName\" value=\"My Server\"/>\n"));
    }

    #[test]
    fn test_satisfactory_inline_tokens() {
        let content = "[/Script/Engine.GameSession]\nMaxPlayers=64\n[URL]\nGamePort=1,QueryGamePort=2\n";
        let result = protect_for_game(content, GameType::Satisfactory, &fields("1.1.1.1", 17777, 4));
        assert_eq!(
            result,
            "[/Script/Engine.GameSession]\nMaxPlayers=4\n[URL]\nGamePort=17777,QueryGamePort=2\n"
        );
    }

    #[test]
    fn test_palworld_option_settings() {
        let content = "[/Script/Pal.PalGameWorldSettings]\nOptionSettings=(Difficulty=None,ServerPlayerMaxNum=32,PublicPort=8211,PublicIP=\"\",RCONEnabled=False)\n";
        let result = protect_for_game(content, GameType::Palworld, &fields("10.2.2.2", 18211, 16));
        assert_eq!(
            result,
            "[/Script/Pal.PalGameWorldSettings]\nOptionSettings=(Difficulty=None,ServerPlayerMaxNum=16,PublicPort=18211,PublicIP=\"10.2.2.2\",RCONEnabled=False)\n"
        );
    }

    #[test]
    fn test_valheim_start_script_flag() {
        let content = "#!/bin/bash\n./valheim_server.x86_64 -name \"x\" -port 2456 -world \"Dedicated\"\n";
        let result = protect_for_game(content, GameType::Valheim, &fields("1.1.1.1", 12456, 10));
        assert_eq!(
            result,
            "#!/bin/bash\n./valheim_server.x86_64 -name \"x\" -port 12456 -world \"Dedicated\"\n"
        );
    }

    #[test]
    fn test_generic_keeps_key_spelling() {
        let content = "{\n  \"name\": \"Enshrouded\",\n  \"ip\": \"0.0.0.0\",\n  \"gamePort\": 15636,\n  \"slotCount\": 16\n}\n";
        let result = protect_for_game(content, GameType::Enshrouded, &fields("10.3.3.3", 15700, 8));
        assert_eq!(
            result,
            "{\n  \"name\": \"Enshrouded\",\n  \"ip\": \"10.3.3.3\",\n  \"gamePort\": 15700,\n  \"slotCount\": 8\n}\n"
        );
    }

    #[test]
    fn test_unknown_game_follows_policy() {
        let content = "ServerPort=1\nMotd=hello\n";
        let f = fields("1.1.1.1", 20000, 4);
        assert_eq!(
            protect_config_fields(content, "BOGUS", &f, FallbackPolicy::Reject),
            Err(GuardError::UnknownGameType("BOGUS".to_string()))
        );
        let result = protect_config_fields(content, "BOGUS", &f, FallbackPolicy::Generic).unwrap();
        assert_eq!(result, "ServerPort=20000\nMotd=hello\n");
    }

    #[test]
    fn test_no_port_leaves_port_lines() {
        let content = "server-port=1000\nmax-players=5\n";
        let protected = ProtectedFields {
            ip_address: None,
            port: None,
            max_players: 7,
        };
        let result = protect_for_game(content, GameType::Minecraft, &protected);
        assert_eq!(result, "server-port=1000\nmax-players=7\n");
    }
}
