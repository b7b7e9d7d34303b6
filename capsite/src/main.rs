use std::{
    error::Error,
    process::ExitCode,
    sync::Arc,
    time::{Duration, Instant},
};

use capsite::{
    Capability, DispatchSettings, Guard, NativeThread, Receiver, RootCreateInfo,
    RootNode, UnsupportedMessage, export_capability, register_capability, resolve,
    settings,
};
use clap::Parser;
use parking_lot::Mutex;

#[derive(Debug, Parser)]
#[command(name = "capsite", about = "Inline-cached capability dispatch demo")]
struct Args {
    /// Specializations per call site before it goes generic.
    #[arg(long)]
    limit: Option<usize>,

    /// Number of distinct receiver types sent through the call site.
    #[arg(long, default_value_t = 4)]
    receivers: usize,

    /// Threads spinning on a guard while it gets invalidated.
    #[arg(long, default_value_t = 4)]
    pollers: usize,

    /// How long the pollers spin before the guard is invalidated.
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,

    /// List registered capabilities and exit.
    #[arg(long)]
    list: bool,
}

trait LengthOps: Send + Sync {
    fn length(&self, receiver: &dyn Receiver) -> Result<usize, UnsupportedMessage>;
}

struct Length;

impl Capability for Length {
    const NAME: &'static str = "Length";
    type Ops = dyn LengthOps;

    fn fallback() -> Arc<dyn LengthOps> {
        Arc::new(NoLength)
    }
}

register_capability!(Length);

struct NoLength;

impl LengthOps for NoLength {
    fn length(&self, receiver: &dyn Receiver) -> Result<usize, UnsupportedMessage> {
        Err(UnsupportedMessage::new(
            Length::NAME,
            "length",
            receiver.receiver_type(),
        ))
    }
}

struct ByDowncast<T>(fn(&T) -> usize);

impl<T: Receiver> LengthOps for ByDowncast<T> {
    fn length(&self, receiver: &dyn Receiver) -> Result<usize, UnsupportedMessage> {
        match receiver.downcast_ref::<T>() {
            Some(value) => Ok((self.0)(value)),
            None => NoLength.length(receiver),
        }
    }
}

#[derive(Debug)]
struct Text(String);
#[derive(Debug)]
struct Bytes(Vec<u8>);
#[derive(Debug)]
struct Items(Vec<i64>);
#[derive(Debug)]
struct Pair(i64, i64);
#[derive(Debug)]
struct Flag(bool);

fn text_length() -> Arc<dyn LengthOps> {
    Arc::new(ByDowncast::<Text>(|t| t.0.chars().count()))
}

fn bytes_length() -> Arc<dyn LengthOps> {
    Arc::new(ByDowncast::<Bytes>(|b| b.0.len()))
}

fn items_length() -> Arc<dyn LengthOps> {
    Arc::new(ByDowncast::<Items>(|i| i.0.len()))
}

fn pair_length() -> Arc<dyn LengthOps> {
    Arc::new(ByDowncast::<Pair>(|_| 2))
}

export_capability!(LENGTH_TEXT: Length => Text {
    cached: |_| text_length(),
    uncached: text_length,
});
export_capability!(LENGTH_BYTES: Length => Bytes {
    cached: |_| bytes_length(),
    uncached: bytes_length,
});
export_capability!(LENGTH_ITEMS: Length => Items {
    cached: |_| items_length(),
    uncached: items_length,
});
export_capability!(LENGTH_PAIR: Length => Pair {
    cached: |_| pair_length(),
    uncached: pair_length,
});

fn sample_receivers(count: usize) -> Vec<Box<dyn Receiver>> {
    let all: Vec<Box<dyn Receiver>> = vec![
        Box::new(Text("capsite".into())),
        Box::new(Bytes(vec![1, 2, 3])),
        Box::new(Items(vec![4, 5, 6, 7])),
        Box::new(Pair(8, 9)),
        Box::new(Flag(true)),
    ];
    all.into_iter().take(count).collect()
}

fn dispatch_demo(args: &Args) -> Result<(), Box<dyn Error>> {
    let factory = resolve::<Length>()?;
    let root = RootNode::new(RootCreateInfo {
        name: Some("demo".into()),
        language: None,
    });
    let site = root.adopt(Arc::new(factory.create_dispatched_default()))?;

    for receiver in sample_receivers(args.receivers) {
        let receiver = receiver.as_ref();
        let ops = site.lookup(receiver)?;
        match ops.length(receiver) {
            Ok(length) => println!("{receiver:?}: length {length}"),
            Err(err) => println!("{receiver:?}: {err}"),
        }
    }

    println!(
        "limit {}: {} rewrite(s), generic: {}",
        settings().default_limit,
        root.rewrite_count(),
        site.is_generic()
    );
    print!("{}", root.dump());
    Ok(())
}

fn guard_demo(args: &Args) -> Result<(), Box<dyn Error>> {
    let guard = Guard::create("demo");
    let seen = Arc::new(Mutex::new(Vec::with_capacity(args.pollers)));

    let pollers = (0..args.pollers)
        .map(|i| {
            let guard = guard.clone();
            let seen = seen.clone();
            NativeThread::spawn_named(format!("poller-{i}"), move || {
                while guard.is_valid() {
                    std::hint::spin_loop();
                }
                seen.lock().push(Instant::now());
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    std::thread::sleep(Duration::from_millis(args.delay_ms));
    let invalidated_at = Instant::now();
    guard.invalidate_with("demo");

    for poller in &pollers {
        if !poller.join_timeout(Duration::from_secs(1)) {
            log::warn!(
                "{} did not observe the invalidation",
                poller.name().unwrap_or("poller")
            );
        }
    }

    let worst = seen
        .lock()
        .iter()
        .map(|at| at.saturating_duration_since(invalidated_at))
        .max()
        .unwrap_or_default();
    println!(
        "{} poller(s) observed invalidation, worst latency {:?}",
        seen.lock().len(),
        worst
    );
    Ok(())
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
    if args.list {
        for info in capsite::Registry::global()?.capabilities() {
            println!("{} ({} export(s))", info.name, info.exports);
        }
        return Ok(());
    }

    dispatch_demo(args)?;
    guard_demo(args)
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut dispatch = DispatchSettings::default();
    if let Some(limit) = args.limit {
        dispatch.default_limit = limit;
    }

    let result = dispatch
        .install()
        .map_err(Box::<dyn Error>::from)
        .and_then(|()| run(&args));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
