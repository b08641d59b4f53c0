//! Line reachability for a small edge filter.
//!
//! For every line, prints whether some flow can still reach and match it, and a
//! representative flow if one exists.
//!
//! Run with:
//! ```bash
//! cargo run --example acl_flows -- --preference application
//! ```

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use clap::{Parser, ValueEnum};

use bdd_acl::acl_to_bdd::AclToBdd;
use bdd_acl::bdd::BddConfig;
use bdd_acl::flow_preference::FlowPreference;
use bdd_acl::model::{
    AclLine, AclLineMatchExpr as E, HeaderSpace, IpAccessList, IpProtocol, IpSpace, SubRange, TcpFlag,
    TcpFlagsMatchConditions,
};
use bdd_acl::packet::BddPacket;
use bdd_acl::source::{referenced_sources, SourceManager};

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Preference {
    Debugging,
    Application,
    TestFilter,
}

impl From<Preference> for FlowPreference {
    fn from(p: Preference) -> Self {
        match p {
            Preference::Debugging => FlowPreference::Debugging,
            Preference::Application => FlowPreference::Application,
            Preference::TestFilter => FlowPreference::TestFilter,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Representative flows for each line of a sample filter")]
struct Cli {
    /// Which kind of flow to prefer.
    #[arg(long, value_enum, default_value = "debugging")]
    preference: Preference,

    /// BDD size (in bits, so the actual size is `2^size` nodes).
    #[arg(long, value_name = "INT", default_value = "20")]
    size: usize,
}

fn sample_filters() -> HashMap<String, IpAccessList> {
    let ssh = HeaderSpace::new()
        .with_ip_protocols([IpProtocol::TCP])
        .with_dst_ports([SubRange::singleton(22)]);
    let web = HeaderSpace::new()
        .with_ip_protocols([IpProtocol::TCP])
        .with_dst_ips(IpSpace::reference("servers"))
        .with_dst_ports([SubRange::singleton(80), SubRange::singleton(443)]);
    let established = HeaderSpace::new()
        .with_ip_protocols([IpProtocol::TCP])
        .with_tcp_flags([TcpFlagsMatchConditions::single(TcpFlag::Ack, true)]);
    let ping = HeaderSpace::new()
        .with_ip_protocols([IpProtocol::ICMP])
        .with_icmp_types([SubRange::singleton(8)]);

    let mgmt = IpAccessList::new(
        "mgmt",
        vec![
            AclLine::accepting(E::And(vec![E::match_src_interface(["mgmt0"]), E::match_header_space(ssh.clone())]))
                .with_name("ssh from mgmt"),
            AclLine::rejecting(E::match_header_space(ssh)).with_name("ssh from anywhere else"),
        ],
    );
    let edge = IpAccessList::new(
        "edge",
        vec![
            AclLine::accepting(E::OriginatingFromDevice).with_name("locally originated"),
            AclLine::acl("mgmt").with_name("management"),
            AclLine::accepting(E::match_header_space(web)).with_name("web servers"),
            AclLine::accepting(E::match_header_space(established.clone())).with_name("established"),
            AclLine::accepting(E::match_header_space(ping)).with_name("ping"),
            AclLine::rejecting(E::match_header_space(established)).with_name("shadowed"),
        ],
    );
    HashMap::from([("mgmt".to_string(), mgmt), ("edge".to_string(), edge)])
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let packet = BddPacket::with_config(BddConfig::default().with_storage_bits(args.size));
    let filters = sample_filters();
    let ip_spaces = HashMap::from([(
        "servers".to_string(),
        Rc::new(IpSpace::Prefix("192.0.2.0/24".parse()?)),
    )]);

    let edge = &filters["edge"];
    let interfaces: BTreeSet<String> = ["eth0", "eth1", "mgmt0"].iter().map(|s| s.to_string()).collect();
    let referenced = referenced_sources(edge, &filters);
    println!("Sources referenced by {}: {:?}", edge.name, referenced);
    let sources = SourceManager::new(&packet, &interfaces, &referenced);

    let compiler = AclToBdd::new(&packet, &filters, &ip_spaces, &sources);
    let lines = compiler.reach_and_match_lines(edge)?;
    let preference = FlowPreference::from(args.preference);

    for (i, &f) in lines.iter().enumerate() {
        let name = match edge.lines.get(i) {
            Some(line) => line.name().unwrap_or("<unnamed>").to_string(),
            None => "<no match>".to_string(),
        };
        match sources.get_flow(&packet, f, preference) {
            Some(flow) => println!("line {} ({}): reachable, e.g. {}", i, name, flow),
            None => println!("line {} ({}): unreachable", i, name),
        }
    }

    let permitted = compiler.to_bdd(edge)?;
    let bdd = packet.bdd();
    println!("permitted formula has {} nodes", bdd.size(permitted));
    let (hits, misses) = bdd.cache_stats();
    println!("bdd: {} nodes, cache hits {} / misses {}", bdd.num_nodes(), hits, misses);

    let time_total = time_total.elapsed();
    println!("\nAll done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
