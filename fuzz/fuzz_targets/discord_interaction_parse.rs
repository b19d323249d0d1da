#![no_main]

use libfuzzer_sys::fuzz_target;
use threadbridge_discord::{
    parse_admin_command, verify_discord_signature, Interaction, InteractionParseError,
};
use threadbridge_reconciler::AdminCommand;

fuzz_target!(|data: &[u8]| {
    assert!(!verify_discord_signature(
        "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        "00",
        "0",
        data
    ));

    let Ok(interaction) = serde_json::from_slice::<Interaction>(data) else {
        return;
    };
    match parse_admin_command(&interaction) {
        Ok(AdminCommand::MapUser { .. }) | Ok(AdminCommand::RemoveMapping { .. }) => {
            assert!(interaction.data.is_some());
        }
        Ok(command) => assert!(!command.name().is_empty()),
        Err(InteractionParseError::UnknownCommand(name)) => {
            assert!(interaction.data.is_some_and(|data| data.name == name));
        }
        Err(_) => {}
    }
});
