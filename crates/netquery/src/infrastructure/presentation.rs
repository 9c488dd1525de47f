//! Terminal output for search results.
//!
//! Two formats:
//!
//! - a fixed-width table, header printed lazily before the first row, so a
//!   search that finds nothing prints no header at all;
//! - JSON lines (one object per server), for scripts.
//!
//! Everything writes to a caller-supplied [`Write`] so the formats can be
//! tested against a `Vec<u8>`.

use std::fmt::{self, Display};
use std::io::{self, Write};

use netquery_core::{game_description, GameMode};
use serde::Serialize;

use crate::application::search::ServerInfo;

/// Width of the `=` rule under the table header.
const RULE_WIDTH: usize = 70;

/// Output format chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    JsonLines,
}

/// Prints servers as they are found, in the chosen format.
#[derive(Debug)]
pub struct ResultPrinter<W: Write> {
    out: W,
    format: OutputFormat,
    printed_header: bool,
}

impl<W: Write> ResultPrinter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            printed_header: false,
        }
    }

    /// Prints the "searching" banner.  Table format only.
    pub fn print_banner(&mut self) -> io::Result<()> {
        if self.format == OutputFormat::Table {
            writeln!(self.out, "\nSearching for servers on local LAN ...")?;
        }
        Ok(())
    }

    /// Prints one server, preceded by the table header if it is the first.
    pub fn print_server<A>(&mut self, info: &ServerInfo<A>) -> io::Result<()>
    where
        A: Display + Serialize,
    {
        match self.format {
            OutputFormat::Table => {
                if !self.printed_header {
                    write_header(&mut self.out)?;
                    self.printed_header = true;
                }
                writeln!(self.out, "{}", TableRow(info))?;
            }
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.out, &JsonServer::from(info))?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    /// Prints the closing count.  Table format only.
    pub fn print_summary(&mut self, found: usize) -> io::Result<()> {
        if self.format == OutputFormat::Table {
            writeln!(self.out, "\n{found} server(s) found.")?;
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Writes the table header and the rule below it.
pub fn write_header<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    write!(out, "{:<5}{:<18}{:<8}", "Ping", "Address", "Players")?;
    writeln!(out, "Description")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

/// One table row, without the trailing newline.
pub struct TableRow<'a, A>(pub &'a ServerInfo<A>);

impl<A: Display> Display for TableRow<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.0;
        let data = &info.data;

        let ping = format!("{:4}", info.ping_ms);
        let players = format!("{}/{} ", data.num_players, data.max_players);
        write!(f, "{ping:<5}{:<22}{players:<4}", info.address.to_string())?;

        if data.game_mode != GameMode::Indetermined {
            write!(f, "({}) ", game_description(data.game_mode, data.game_mission))?;
        }
        if data.server_running {
            f.write_str("(game running) ")?;
        }
        f.write_str(&data.description)
    }
}

/// JSON shape of one server: the payload fields plus address, ping, and the
/// short game name.
#[derive(Serialize)]
struct JsonServer<'a, A> {
    #[serde(flatten)]
    info: &'a ServerInfo<A>,
    game: &'static str,
}

impl<'a, A> From<&'a ServerInfo<A>> for JsonServer<'a, A> {
    fn from(info: &'a ServerInfo<A>) -> Self {
        Self {
            info,
            game: game_description(info.data.game_mode, info.data.game_mission),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use netquery_core::{GameMission, QueryData};

    fn info(mode: GameMode, running: bool) -> ServerInfo<String> {
        ServerInfo {
            address: "192.168.1.20:2342".to_string(),
            ping_ms: 12,
            data: QueryData {
                version: "0.1".to_string(),
                server_running: running,
                num_players: 2,
                max_players: 4,
                game_mode: mode,
                game_mission: GameMission::Doom2,
                description: "Friday night".to_string(),
            },
        }
    }

    fn table_output(servers: &[ServerInfo<String>]) -> String {
        let mut printer = ResultPrinter::new(Vec::new(), OutputFormat::Table);
        for s in servers {
            printer.print_server(s).unwrap();
        }
        printer.print_summary(servers.len()).unwrap();
        String::from_utf8(printer.into_inner()).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "Ping Address           Players Description");
        assert_eq!(lines[2], "=".repeat(70));
    }

    #[test]
    fn test_row_with_known_game_and_running_flag() {
        let row = TableRow(&info(GameMode::Commercial, true)).to_string();
        assert_eq!(
            row,
            "  12 192.168.1.20:2342     2/4 (doom2) (game running) Friday night"
        );
    }

    #[test]
    fn test_row_omits_game_when_mode_indetermined() {
        let row = TableRow(&info(GameMode::Indetermined, false)).to_string();
        assert_eq!(row, "  12 192.168.1.20:2342     2/4 Friday night");
    }

    #[test]
    fn test_wide_values_are_not_truncated() {
        let mut server = info(GameMode::Indetermined, false);
        server.ping_ms = 12345;
        server.data.num_players = 10;
        server.data.max_players = 16;

        let row = TableRow(&server).to_string();

        assert!(row.starts_with("12345192.168.1.20:2342     10/16 "), "got: {row:?}");
    }

    #[test]
    fn test_header_printed_once_before_first_row() {
        let text = table_output(&[
            info(GameMode::Commercial, false),
            info(GameMode::Retail, false),
        ]);

        assert_eq!(text.matches("Description").count(), 1);
        assert!(text.ends_with("\n2 server(s) found.\n"));
    }

    #[test]
    fn test_no_header_when_nothing_found() {
        let text = table_output(&[]);
        assert_eq!(text, "\n0 server(s) found.\n");
    }

    #[test]
    fn test_json_lines_one_object_per_server() {
        // Arrange
        let mut printer = ResultPrinter::new(Vec::new(), OutputFormat::JsonLines);

        // Act
        printer.print_banner().unwrap();
        printer.print_server(&info(GameMode::Commercial, true)).unwrap();
        printer.print_summary(1).unwrap();

        // Assert
        let text = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1, "banner and summary are table-only");
        let value: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(value["address"], "192.168.1.20:2342");
        assert_eq!(value["ping_ms"], 12);
        assert_eq!(value["game"], "doom2");
        assert_eq!(value["server_running"], true);
    }
}
