use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use runtime_monitor::tracker::RouteStat;

#[derive(Parser)]
#[command(name = "monitor-cli")]
#[command(about = "Query a running runtime monitor", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8099")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current sample
    Current,
    /// Show sample history
    History {
        /// Window in seconds
        #[arg(long, conflicts_with_all = ["minutes", "hours"])]
        window: Option<u64>,
        /// Window in minutes
        #[arg(long, conflicts_with = "hours")]
        minutes: Option<u64>,
        /// Window in hours
        #[arg(long)]
        hours: Option<u64>,
    },
    /// Show per-route statistics
    Routes {
        #[arg(long, value_enum, default_value_t = SortKey::Requests)]
        sort: SortKey,
    },
    /// Follow the live sample stream
    Watch {
        /// Stop after this many samples
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    Requests,
    Memory,
    Cpu,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Current => {
            let res = client.get(format!("{}/api/metrics", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::History { window, minutes, hours } => {
            let mut query = Vec::new();
            if let Some(w) = window {
                query.push(("window", w));
            }
            if let Some(m) = minutes {
                query.push(("minutes", m));
            }
            if let Some(h) = hours {
                query.push(("hours", h));
            }
            let res = client
                .get(format!("{}/api/metrics/history", cli.url))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Routes { sort } => {
            let res = client.get(format!("{}/api/metrics/routes", cli.url)).send().await?;
            if !res.status().is_success() {
                eprintln!("Error: monitor returned status {}", res.status());
                return Ok(());
            }
            let mut stats: Vec<RouteStat> = res.json().await?;
            sort_routes(&mut stats, sort);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Watch { count } => {
            let mut res = client.get(format!("{}/api/metrics/stream", cli.url)).send().await?;
            let mut seen = 0;
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = res.chunk().await? {
                buffer.extend_from_slice(&chunk);
                for data in take_data_lines(&mut buffer) {
                    println!("{}", data);
                    seen += 1;
                    if count.is_some_and(|limit| seen >= limit) {
                        return Ok(());
                    }
                }
            }
        }
    }

    Ok(())
}

fn sort_routes(stats: &mut [RouteStat], key: SortKey) {
    stats.sort_by(|a, b| {
        let ordering = match key {
            SortKey::Requests => b.requests.cmp(&a.requests),
            SortKey::Memory => b.memory_usage.total_cmp(&a.memory_usage),
            SortKey::Cpu => b.cpu_usage.total_cmp(&a.cpu_usage),
        };
        ordering.then_with(|| a.route.cmp(&b.route))
    });
}

/// Remove every complete line from `buffer` and return the SSE `data:`
/// payloads among them. A trailing partial line stays buffered, so a
/// character split across chunks is decoded once it is whole.
fn take_data_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let Some(end) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };
    let complete: Vec<u8> = buffer.drain(..=end).collect();
    String::from_utf8_lossy(&complete)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: monitor returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character_is_decoded_whole() {
        let event = "data: {\"route\":\"/café\"}\n\n".as_bytes();
        let split = event.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut buffer = Vec::new();
        buffer.extend_from_slice(&event[..split]);
        assert!(take_data_lines(&mut buffer).is_empty());

        buffer.extend_from_slice(&event[split..]);
        assert_eq!(take_data_lines(&mut buffer), vec!["{\"route\":\"/café\"}".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_comments_and_partial_lines_are_skipped() {
        let mut buffer = b": keep-alive\n\ndata: 1\n\ndata: 2".to_vec();
        assert_eq!(take_data_lines(&mut buffer), vec!["1".to_string()]);
        assert_eq!(buffer, b"data: 2");
    }
}
