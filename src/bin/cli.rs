use clap::{App, Arg, SubCommand};
use shmbus::{
    Bus, BusError, FileConfig, PublisherOptions, Recv, Region, Result, RingType,
};
use std::{sync::Arc, thread, time::Duration, time::Instant};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("shmbus-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shared-memory message bus CLI tool")
        .subcommand(
            SubCommand::with_name("init")
                .about("Build a multi-topic region from a JSON config file")
                .arg(
                    Arg::with_name("config")
                        .short("c")
                        .long("config")
                        .value_name("FILE")
                        .help("JSON config file with region and topic settings")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("path")
                        .short("p")
                        .long("path")
                        .value_name("PATH")
                        .help("Shared-memory path, e.g. /shmbus-core")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("send")
                .about("Publish numbered test messages to a topic")
                .arg(
                    Arg::with_name("topic")
                        .short("t")
                        .long("topic")
                        .value_name("TOPIC")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("n")
                        .long("count")
                        .value_name("N")
                        .help("Messages to publish (default 1000)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("rate")
                        .long("rate")
                        .value_name("HZ")
                        .help("Rate limit in messages per second (default unlimited)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("mwmr")
                        .long("mwmr")
                        .help("Use a multi-writer ring for the topic"),
                ),
        )
        .subcommand(
            SubCommand::with_name("listen")
                .about("Consume messages from a topic and print a summary")
                .arg(
                    Arg::with_name("topic")
                        .short("t")
                        .long("topic")
                        .value_name("TOPIC")
                        .required(true)
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("seconds")
                        .short("s")
                        .long("seconds")
                        .value_name("SECS")
                        .help("How long to poll (default 5)")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("inspect")
                .about("Print the header and per-topic state of a region")
                .arg(
                    Arg::with_name("path")
                        .short("p")
                        .long("path")
                        .value_name("PATH")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("unlink")
                .about("Remove a shared-memory region object")
                .arg(
                    Arg::with_name("path")
                        .short("p")
                        .long("path")
                        .value_name("PATH")
                        .required(true)
                        .takes_value(true),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("init", Some(sub)) => cmd_init(
            sub.value_of("config").unwrap(),
            sub.value_of("path").unwrap(),
        ),
        ("send", Some(sub)) => cmd_send(
            sub.value_of("topic").unwrap(),
            parse_u64(sub.value_of("count"), 1000)?,
            parse_u64(sub.value_of("rate"), 0)?,
            sub.is_present("mwmr"),
        ),
        ("listen", Some(sub)) => cmd_listen(
            sub.value_of("topic").unwrap(),
            parse_u64(sub.value_of("seconds"), 5)?,
        ),
        ("inspect", Some(sub)) => cmd_inspect(sub.value_of("path").unwrap()),
        ("unlink", Some(sub)) => shmbus::unlink(sub.value_of("path").unwrap()),
        _ => {
            eprintln!("No subcommand given; try --help");
            Ok(())
        }
    }
}

fn parse_u64(value: Option<&str>, default: u64) -> Result<u64> {
    match value {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| BusError::invalid_argument("value", format!("not a number: {}", s))),
    }
}

fn cmd_init(config_path: &str, shm_path: &str) -> Result<()> {
    let config = FileConfig::from_path(config_path)?;
    let outcome = Bus::build_region(shm_path, &config)?;
    println!("{}: {:?} ({} topics)", shm_path, outcome, config.topics.len());
    Ok(())
}

fn cmd_send(topic: &str, count: u64, rate: u64, mwmr: bool) -> Result<()> {
    let bus = Bus::new("shmbus-cli");
    let ring_type = if mwmr { RingType::Mwmr } else { RingType::Swmr };
    let mut publisher = bus.create_publisher(
        &PublisherOptions::new(topic)
            .with_ring_type(ring_type)
            .with_rate_limit(rate)
            .with_block_on_full(rate > 0),
    )?;

    let started = Instant::now();
    for i in 0..count {
        let payload = format!("message-{} from {}", i, publisher.pub_id());
        publisher.send(payload.as_bytes())?;
    }
    let elapsed = started.elapsed();
    let health = publisher.health();
    println!(
        "published {} messages in {:?} ({:.0} msg/s, {} errors)",
        count,
        elapsed,
        count as f64 / elapsed.as_secs_f64(),
        health.errors
    );
    Ok(())
}

fn cmd_listen(topic: &str, seconds: u64) -> Result<()> {
    let bus = Bus::new("shmbus-cli");
    let mut subscriber = bus.create_subscriber(topic)?;
    let mut buf = vec![0u8; 64 * 1024];

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut received: u64 = 0;
    while Instant::now() < deadline {
        match subscriber.recv(&mut buf) {
            Recv::Message { .. } => received += 1,
            Recv::Truncated => {}
            Recv::Empty => thread::sleep(Duration::from_micros(50)),
        }
    }

    let health = subscriber.health();
    println!(
        "received {} messages in {}s (lag {}, errors {}, healthy: {})",
        received, seconds, health.lag, health.errors, health.healthy
    );
    Ok(())
}

fn cmd_inspect(path: &str) -> Result<()> {
    let region = Arc::new(Region::attach(path)?);
    println!(
        "region {}: magic {:#010x}, version {}, {} bytes, {} topics",
        path,
        region.magic(),
        region.version(),
        region.size(),
        region.topic_count()
    );
    for topic in region.topics()? {
        let published = region.published(&topic.name)?;
        println!(
            "  {}: {} x {} B slots ({}), payload up to {} B, {} published",
            topic.name,
            topic.slot_count,
            topic.slot_size,
            topic.ring_type.name(),
            topic.payload_capacity,
            published
        );
    }
    Ok(())
}
