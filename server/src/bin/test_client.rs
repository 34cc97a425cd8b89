//! Headless client for poking at a running server: joins under a name,
//! prints the handshake, turns at random and summarizes the frames it gets.

use clap::Parser;
use rand::Rng;
use shared::{Direction, LineBuffer, MoveCommand, ServerLine, DEFAULT_PORT};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    #[clap(short, long, default_value = "tester")]
    name: String,
    /// How long to stay connected, in seconds
    #[clap(short, long, default_value = "10")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let server_addr = format!("{}:{}", args.host, args.port);

    println!("Connecting to {}", server_addr);
    let stream = TcpStream::connect(&server_addr).await?;
    let (mut reader, mut writer) = stream.into_split();
    writer.write_all(format!("{}\n", args.name).as_bytes()).await?;

    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 4096];

    // Id and world size come first, walls follow with the first frame
    let mut header = Vec::new();
    while header.len() < 2 {
        match buffer.next_line() {
            Some(line) => header.push(line),
            None => {
                let n = reader.read(&mut chunk).await?;
                if n == 0 {
                    println!("Server closed the connection during the handshake");
                    return Ok(());
                }
                buffer.push(&chunk[..n]);
            }
        }
    }
    let client_id: u32 = header[0].parse()?;
    println!("Joined as client {} in a world of size {}", client_id, header[1]);

    let mut rng = rand::thread_rng();
    let mut turn_timer = interval(Duration::from_millis(500));
    let mut report_timer = interval(Duration::from_secs(1));
    let deadline = Instant::now() + Duration::from_secs(args.duration);

    let mut walls = 0;
    let mut lines_seen = 0u64;
    let mut last_self = None;

    loop {
        tokio::select! {
            read = reader.read(&mut chunk) => {
                let n = read?;
                if n == 0 {
                    println!("Server closed the connection");
                    break;
                }
                buffer.push(&chunk[..n]);
                while let Some(line) = buffer.next_line() {
                    lines_seen += 1;
                    match ServerLine::parse(&line) {
                        ServerLine::Wall(_) => walls += 1,
                        ServerLine::Snake(snake) if snake.id == client_id => last_self = Some(snake),
                        ServerLine::Snake(_) | ServerLine::PowerUp(_) => {}
                        ServerLine::Unrecognized => println!("Unrecognized line: {}", line),
                    }
                }
            }
            _ = turn_timer.tick() => {
                let direction = Direction::ALL[rng.gen_range(0..Direction::ALL.len())];
                let command = MoveCommand::new(direction.into()).to_line();
                writer.write_all(command.as_bytes()).await?;
            }
            _ = report_timer.tick() => {
                match &last_self {
                    Some(snake) => println!(
                        "{} lines, {} walls | score {}, alive {}, head {:?}",
                        lines_seen, walls, snake.score, snake.alive, snake.head()
                    ),
                    None => println!("{} lines, {} walls | own snake not seen yet", lines_seen, walls),
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                println!("Test client finished");
                break;
            }
        }
    }

    Ok(())
}
