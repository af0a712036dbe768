use clap::{
    Arg, ArgAction, Command,
    builder::{BoolishValueParser, PossibleValuesParser},
};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("code-ttl")
                .long("code-ttl")
                .help("Seconds an issued code stays valid")
                .default_value("600")
                .env("TRUSTGUARD_CODE_TTL")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("code-space")
                .long("code-space")
                .help("Range codes are drawn from")
                .long_help(
                    "Range codes are drawn from: legacy (100000-999999) or full (000000-999999, zero padded)",
                )
                .default_value("legacy")
                .env("TRUSTGUARD_CODE_SPACE")
                .value_parser(PossibleValuesParser::new(["legacy", "full"])),
        )
        .arg(
            Arg::new("consume-mode")
                .long("consume-mode")
                .help("How a verified code is marked used")
                .long_help(
                    "How a verified code is marked used: strict (atomic, a lost race fails verification) or best-effort (a failed write is logged and ignored)",
                )
                .default_value("strict")
                .env("TRUSTGUARD_CONSUME_MODE")
                .value_parser(PossibleValuesParser::new(["strict", "best-effort"])),
        )
        .arg(
            Arg::new("echo-code")
                .long("echo-code")
                .help("Return the issued code in the send-otp response (demo only)")
                .env("TRUSTGUARD_ECHO_CODE")
                .action(ArgAction::SetTrue)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new("delivery-webhook")
                .long("delivery-webhook")
                .help("POST issued codes to this URL instead of logging them")
                .env("TRUSTGUARD_DELIVERY_WEBHOOK"),
        )
}
