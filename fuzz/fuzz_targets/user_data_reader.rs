#![no_main]
use libfuzzer_sys::fuzz_target;
use sticky_assignor::protocol::messages::StickyAssignorUserData;

fuzz_target!(|data: &[u8]| {
    let Ok(user_data) = StickyAssignorUserData::decode(data) else {
        return;
    };

    // whatever decodes must encode to a record that decodes the same way
    let encoded = user_data.encode().expect("encode decoded user data");
    let restored = StickyAssignorUserData::decode(&encoded).expect("decode encoded user data");
    assert_eq!(user_data.topics(), restored.topics());
});
