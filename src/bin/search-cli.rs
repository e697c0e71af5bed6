//! Terminal front end for a running search aggregator.

use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::time::Duration;

use search_aggregator::client::{
    with_retries, AggregatorClient, ClientStream, FeedRequest, NewsFeed, SearchFeed, VideoFeed,
};
use search_aggregator::feed::Feed;
use search_aggregator::{SearchItem, SearchKind};

#[derive(Parser, Debug)]
#[command(name = "search-cli", version, about = "Search, news, videos, weather and AI summaries")]
struct Cli {
    /// Base URL of the aggregator server
    #[arg(long, env = "SEARCH_SERVER_URL", default_value = "http://localhost:5000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Web or image search
    Search {
        query: String,
        #[arg(long)]
        images: bool,
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Popular articles from the last month
    News {
        query: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// YouTube videos
    Videos {
        query: String,
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },
    /// Current weather, for the server's default city when none is given
    Weather { city: Option<String> },
    /// Autocomplete suggestions
    Complete { query: String },
    /// Summarize pages with the given prompt
    Summarize {
        #[arg(long)]
        prompt: String,
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Search the web and summarize the top results
    Answer { query: String },
}

async fn load_pages<R: FeedRequest>(client: &AggregatorClient, request: &R, pages: u32) -> Result<Feed<R::Page>> {
    let mut feed = Feed::new();
    for _ in 0..pages.max(1) {
        if !client.load_more(request, &mut feed).await? {
            break;
        }
    }
    Ok(feed)
}

async fn print_stream(mut stream: ClientStream) -> Result<()> {
    let mut stdout = std::io::stdout();
    while let Some(part) = stream.next().await {
        write!(stdout, "{}", part?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = AggregatorClient::new(cli.server);

    match cli.command {
        Command::Search { query, images, pages } => {
            let kind = if images { SearchKind::Image } else { SearchKind::Web };
            let feed = load_pages(&client, &SearchFeed { query, kind }, pages).await?;
            for item in feed.items() {
                match item {
                    SearchItem::Web(web) => println!("{}\n  {}\n  {}\n", web.title, web.link, web.snippet),
                    SearchItem::Image(image) => {
                        println!("{} ({}x{})\n  {}\n", image.title, image.image_width, image.image_height, image.link)
                    }
                }
            }
        }
        Command::News { query, pages } => {
            let feed = load_pages(&client, &NewsFeed { query }, pages).await?;
            for article in feed.items() {
                println!("{} [{}]\n  {}\n", article.title, article.source.name, article.url);
            }
        }
        Command::Videos { query, pages } => {
            let feed = load_pages(&client, &VideoFeed { query }, pages).await?;
            for video in feed.items() {
                println!(
                    "{} ({})\n  https://www.youtube.com/watch?v={}\n",
                    video.snippet.title, video.snippet.channel_title, video.id.video_id
                );
            }
        }
        Command::Weather { city } => {
            let weather = with_retries(2, Duration::from_secs(1), || client.weather(city.as_deref())).await?;
            println!(
                "{}: {:.1}°C (feels like {:.1}°C), {}\n  humidity {}%, wind {} m/s, sunrise {}, sunset {}",
                weather.location,
                weather.temperature,
                weather.feels_like,
                weather.description,
                weather.humidity,
                weather.wind_speed,
                weather.sunrise,
                weather.sunset
            );
        }
        Command::Complete { query } => {
            for suggestion in client.complete(&query).await? {
                println!("{}", suggestion);
            }
        }
        Command::Summarize { prompt, urls } => {
            print_stream(client.summarize(urls, &prompt).await?).await?;
        }
        Command::Answer { query } => {
            print_stream(client.answer(&query).await?).await?;
        }
    }

    Ok(())
}
