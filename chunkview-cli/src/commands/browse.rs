//! `chunkview browse` - interactive chunk-by-chunk dataset browser.

use std::sync::Arc;
use std::time::Duration;

use console::{pad_str, style, truncate_str, Alignment};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chunkview::config::{ConfigFile, ConfigKey};
use chunkview::fetch::HttpPreviewClient;
use chunkview::navigation::{ControllerBackends, JsonExporter, NavigationController, PreviewView};
use chunkview::status::WebSocketStatusChannel;
use chunkview::{FieldValue, ReadinessState};

use crate::error::CliError;

/// Widest a table column is allowed to grow.
const MAX_COLUMN_WIDTH: usize = 24;

/// Arguments for the browse command.
pub struct BrowseArgs {
    pub handle: String,
    pub base_url: Option<String>,
    pub chunk_size: Option<u32>,
    pub no_prefetch: bool,
}

/// One line of input at the browse prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Next,
    Previous,
    Go(i64),
    Size(u32),
    Export(Option<String>),
    Help,
    Quit,
}

/// Run the browse command until the user quits or presses Ctrl+C.
pub fn run(args: BrowseArgs, mut config: ConfigFile) -> Result<(), CliError> {
    if let Some(url) = &args.base_url {
        ConfigKey::ServerBaseUrl.set(&mut config, url)?;
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    ctrlc::set_handler(move || signal.cancel())
        .map_err(|e| CliError::Config(format!("failed to set signal handler: {}", e)))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(browse(args, config, shutdown));

    // stdin is read on a blocking thread that cannot be interrupted
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn browse(
    args: BrowseArgs,
    config: ConfigFile,
    shutdown: CancellationToken,
) -> Result<(), CliError> {
    let mut preview = config.preview_config();
    if let Some(size) = args.chunk_size {
        preview = preview.with_chunk_size(size);
    }
    if args.no_prefetch {
        preview = preview.with_prefetch(false);
    }

    let client = Arc::new(HttpPreviewClient::new(&config.client_config())?);
    let status = Arc::new(WebSocketStatusChannel::new(config.status_url()));
    let exporter = Arc::new(JsonExporter::new(config.export_directory()));
    let backends = ControllerBackends::http(client, status).with_exporter(exporter);
    let controller = NavigationController::spawn(backends, &preview);

    println!(
        "{} v{} - {}",
        style("chunkview").bold(),
        chunkview::VERSION,
        config.server.base_url
    );
    println!("{}", help_text());

    let mut views = controller.subscribe();
    controller.open(args.handle)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                break;
            }

            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print!("{}", render_view(&view));
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(ReplCommand::Quit)) => break,
                    Ok(Some(command)) => apply(&controller, command).await?,
                    Err(message) => println!("{} {}", style("?").yellow(), message),
                }
            }
        }
    }

    let stats = controller.dispose().await?;
    println!(
        "{} {} fetched, {} from cache, {} prefetched, {} stale, cache hit rate {:.0}%",
        style("Session:").bold(),
        stats.primary_requests,
        stats.cache_hits,
        stats.prefetch_stored,
        stats.stale_responses,
        stats.cache.hit_rate() * 100.0
    );
    Ok(())
}

async fn apply(controller: &NavigationController, command: ReplCommand) -> Result<(), CliError> {
    debug!(command = ?command, "Browse command");
    match command {
        ReplCommand::Next => controller.go_to_next()?,
        ReplCommand::Previous => controller.go_to_previous()?,
        ReplCommand::Go(index) => controller.go_to_index(index)?,
        ReplCommand::Size(size) => controller.change_chunk_size(size)?,
        ReplCommand::Export(name) => match controller.export_current(name).await {
            Ok(artifact) => println!("{} {}", style("Exported").green(), artifact),
            Err(e) => println!("{} {}", style("Export failed:").red(), e),
        },
        ReplCommand::Help => println!("{}", help_text()),
        ReplCommand::Quit => {}
    }
    Ok(())
}

fn parse_command(line: &str) -> Result<Option<ReplCommand>, String> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();

    let command = match word {
        "n" | "next" => ReplCommand::Next,
        "p" | "prev" | "previous" => ReplCommand::Previous,
        "g" | "go" => {
            let index = rest
                .first()
                .and_then(|arg| arg.parse::<i64>().ok())
                .ok_or_else(|| "usage: g <chunk index>".to_string())?;
            ReplCommand::Go(index)
        }
        "s" | "size" => {
            let size = rest
                .first()
                .and_then(|arg| arg.parse::<u32>().ok())
                .filter(|size| *size > 0)
                .ok_or_else(|| "usage: s <rows per chunk>, at least 1".to_string())?;
            ReplCommand::Size(size)
        }
        "e" | "export" => {
            let name = rest.join(" ");
            ReplCommand::Export(if name.is_empty() { None } else { Some(name) })
        }
        "h" | "help" | "?" => ReplCommand::Help,
        "q" | "quit" | "exit" => ReplCommand::Quit,
        other => return Err(format!("unknown command '{}', type h for help", other)),
    };
    Ok(Some(command))
}

fn help_text() -> String {
    format!(
        "{}  n next  p previous  g <i> go to chunk  s <n> chunk size  e [name] export  q quit",
        style("keys:").dim()
    )
}

fn render_readiness(readiness: &ReadinessState) -> String {
    let label = readiness.to_string();
    match readiness {
        ReadinessState::Ready => style(label).green().to_string(),
        ReadinessState::Loading(_) => style(label).yellow().to_string(),
        ReadinessState::Error(_) | ReadinessState::InvalidHandle => {
            style(label).red().bold().to_string()
        }
        ReadinessState::Idle => style(label).dim().to_string(),
    }
}

fn render_view(view: &PreviewView) -> String {
    let mut out = String::new();
    let handle = view
        .handle
        .as_ref()
        .map(|h| h.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());
    out.push_str(&format!(
        "\n{} [{}]",
        style(handle).bold(),
        render_readiness(&view.readiness)
    ));
    if view.loading {
        out.push_str(&format!(" {}", style("loading...").dim()));
    }
    out.push('\n');

    if let (Some(chunk), Some(nav)) = (&view.chunk, view.navigation) {
        let first = chunk.first_row();
        out.push_str(&format!(
            "chunk {} of {} | rows {}-{} of {}{}\n",
            nav.current_index,
            nav.page_count(),
            first + 1,
            first + chunk.rows().len() as u64,
            nav.total_rows,
            if nav.has_more { "" } else { " (end)" }
        ));
        out.push_str(&render_table(chunk.rows()));
    }

    if let Some(advisory) = &view.advisory {
        out.push_str(&format!("{} {}\n", style("!").yellow().bold(), advisory));
    }
    out
}

fn render_table(rows: &[chunkview::Record]) -> String {
    let Some(first) = rows.first() else {
        return format!("{}\n", style("(no rows)").dim());
    };
    let columns: Vec<&String> = first.keys().collect();

    let cell = |row: &chunkview::Record, column: &str| -> String {
        row.get(column)
            .map(FieldValue::to_string)
            .unwrap_or_default()
    };
    let widths: Vec<usize> = columns
        .iter()
        .map(|column| {
            rows.iter()
                .map(|row| console::measure_text_width(&cell(row, column)))
                .chain(std::iter::once(column.len()))
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let format_line = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(text, width)| {
                let text = truncate_str(text, *width, "~");
                pad_str(&text, *width, Alignment::Left, None).into_owned()
            })
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let mut out = String::new();
    let header = format_line(columns.iter().map(|c| c.to_string()).collect());
    out.push_str(&format!("{}\n", style(header).bold()));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("{}\n", rule.join("-+-")));
    for row in rows {
        let line = format_line(columns.iter().map(|column| cell(row, column)).collect());
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkview::{Chunk, DatasetHandle, NavigationState, Record};

    fn record(id: i64, name: &str) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), FieldValue::Integer(id));
        record.insert("name".to_string(), FieldValue::Text(name.to_string()));
        record
    }

    #[test]
    fn test_parse_navigation_commands() {
        assert_eq!(parse_command("n"), Ok(Some(ReplCommand::Next)));
        assert_eq!(parse_command("  previous "), Ok(Some(ReplCommand::Previous)));
        assert_eq!(parse_command("g 12"), Ok(Some(ReplCommand::Go(12))));
        assert_eq!(parse_command("s 50"), Ok(Some(ReplCommand::Size(50))));
        assert_eq!(parse_command("q"), Ok(Some(ReplCommand::Quit)));
        assert_eq!(parse_command(""), Ok(None));
    }

    #[test]
    fn test_parse_export_name() {
        assert_eq!(parse_command("e"), Ok(Some(ReplCommand::Export(None))));
        assert_eq!(
            parse_command("export march sales"),
            Ok(Some(ReplCommand::Export(Some("march sales".to_string()))))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_command("g").is_err());
        assert!(parse_command("s 0").is_err());
        assert!(parse_command("s lots").is_err());
        assert!(parse_command("jump").is_err());
    }

    #[test]
    fn test_render_view_with_chunk() {
        console::set_colors_enabled(false);
        let chunk = Chunk::new(1, 2, 5, vec![record(3, "ada"), record(4, "grace")], true).unwrap();
        let view = PreviewView {
            handle: Some(DatasetHandle::parse("valid-1").unwrap()),
            readiness: ReadinessState::Ready,
            navigation: Some(NavigationState::from_chunk(&chunk)),
            chunk: Some(Arc::new(chunk)),
            advisory: Some("request timed out".to_string()),
            loading: false,
        };

        let text = render_view(&view);
        assert!(text.contains("valid-1 [ready]"));
        assert!(text.contains("chunk 1 of 3 | rows 3-4 of 5"));
        assert!(text.contains("id | name"));
        assert!(text.contains("4  | grace"));
        assert!(text.contains("! request timed out"));
    }

    #[test]
    fn test_render_empty_table() {
        console::set_colors_enabled(false);
        assert_eq!(render_table(&[]), "(no rows)\n");
    }
}
