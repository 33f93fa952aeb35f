use lazy_static::lazy_static;
use serde::Deserialize;
use serde_xml_rs::from_str;
use std::collections::BTreeMap;

use crate::avp::AvpType;

#[derive(Debug, Clone)]
pub struct AvpDefinition {
    pub code: u32,
    pub vendor_id: Option<u32>,
    pub name: String,
    pub avp_type: AvpType,
    pub mandatory: bool,
    pub protected: bool,
}

#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub code: u32,
    pub name: String,
}

/// Runtime-extensible AVP/command dictionary.
///
/// Base (vendor-less) AVPs are keyed by code alone; vendor AVPs are keyed
/// by `(vendor_id, code)` since different vendors are free to reuse the
/// same AVP code for unrelated attributes.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    avps: BTreeMap<u32, AvpDefinition>,
    vendor_avps: BTreeMap<(u32, u32), AvpDefinition>,
    commands: BTreeMap<u32, CommandDefinition>,
}

impl Dictionary {
    pub fn new(xmls: &[&str]) -> Dictionary {
        let mut dict = Dictionary::default();
        for xml in xmls {
            dict.load(xml);
        }
        dict
    }

    pub fn empty() -> Dictionary {
        Dictionary::default()
    }

    fn load(&mut self, xml: &str) {
        let parsed: Diameter = from_str(xml).expect("malformed dictionary XML");

        for avp in &parsed.application.avps {
            let avp_type = avp_type_from_str(&avp.data.data_type);
            let vendor_id = avp.vendor_id.as_ref().map(|v| v.parse::<u32>().unwrap());
            let definition = AvpDefinition {
                code: avp.code.parse().unwrap(),
                vendor_id,
                name: avp.name.clone(),
                avp_type,
                mandatory: avp.must.as_deref() == Some("M") || avp.must.as_deref() == Some("V,M"),
                protected: avp.may.as_deref() == Some("P"),
            };
            self.register_avp(definition);
        }

        if let Some(command) = &parsed.application.command {
            let code: u32 = command.code.parse().unwrap();
            self.register_command(CommandDefinition {
                code,
                name: command.name.clone(),
            });
        }
    }

    pub fn register_avp(&mut self, definition: AvpDefinition) {
        match definition.vendor_id {
            Some(vendor_id) => {
                self.vendor_avps.insert((vendor_id, definition.code), definition);
            }
            None => {
                self.avps.insert(definition.code, definition);
            }
        }
    }

    pub fn register_command(&mut self, definition: CommandDefinition) {
        self.commands.insert(definition.code, definition);
    }

    fn lookup(&self, code: u32, vendor_id: Option<u32>) -> Option<&AvpDefinition> {
        match vendor_id {
            Some(vendor_id) => self.vendor_avps.get(&(vendor_id, code)),
            None => self.avps.get(&code),
        }
    }

    pub fn get_avp(&self, code: u32, vendor_id: Option<u32>) -> Option<&AvpDefinition> {
        self.lookup(code, vendor_id)
    }

    pub fn get_avp_type(&self, code: u32, vendor_id: Option<u32>) -> Option<&AvpType> {
        self.lookup(code, vendor_id).map(|avp| &avp.avp_type)
    }

    pub fn get_avp_name(&self, code: u32, vendor_id: Option<u32>) -> Option<&str> {
        self.lookup(code, vendor_id).map(|avp| avp.name.as_str())
    }

    pub fn get_command(&self, code: u32) -> Option<&CommandDefinition> {
        self.commands.get(&code)
    }

    pub fn get_command_name(&self, code: u32) -> Option<&str> {
        self.commands.get(&code).map(|c| c.name.as_str())
    }
}

fn avp_type_from_str(s: &str) -> AvpType {
    match s {
        "UTF8String" => AvpType::UTF8String,
        "OctetString" => AvpType::OctetString,
        "Integer32" => AvpType::Integer32,
        "Integer64" => AvpType::Integer64,
        "Unsigned32" => AvpType::Unsigned32,
        "Unsigned64" => AvpType::Unsigned64,
        "Enumerated" => AvpType::Enumerated,
        "Grouped" => AvpType::Grouped,
        "DiameterIdentity" => AvpType::Identity,
        "DiameterURI" => AvpType::DiameterURI,
        "Time" => AvpType::Time,
        "Address" => AvpType::Address,
        "IPv4" => AvpType::AddressIPv4,
        "IPv6" => AvpType::AddressIPv6,
        "Float32" => AvpType::Float32,
        "Float64" => AvpType::Float64,
        _ => AvpType::Unknown,
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Diameter {
    application: Application,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Application {
    id: String,
    name: String,
    command: Option<Command>,
    #[serde(rename = "avp", default)]
    avps: Vec<Avp>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Command {
    code: String,
    short: String,
    name: String,
    request: CommandDetail,
    answer: CommandDetail,
}

#[derive(Debug, Deserialize, PartialEq)]
struct CommandDetail {
    #[serde(rename = "rule", default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Rule {
    avp: String,
    required: String,
    max: Option<String>,
    min: Option<String>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Avp {
    name: String,
    code: String,
    #[serde(rename = "vendor-id")]
    vendor_id: Option<String>,
    must: Option<String>,
    may: Option<String>,
    #[serde(rename = "must-not")]
    must_not: Option<String>,
    #[serde(rename = "may-encrypt")]
    may_encrypt: Option<String>,
    data: Data,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Data {
    #[serde(rename = "type")]
    data_type: String,
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    code: String,
    name: String,
}

lazy_static! {
    pub static ref DEFAULT_DICT: Dictionary = Dictionary::new(&[&DEFAULT_DICT_XML]);
    pub static ref DEFAULT_DICT_XML: &'static str = {
        let xml = r#"
<diameter>
    <application id="0" name="Base">
		<avp name="Session-Id" code="263" must="M" may="P" must-not="V" may-encrypt="Y">
			<data type="UTF8String"/>
		</avp>

		<avp name="Origin-Host" code="264" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Origin-Realm" code="296" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Destination-Host" code="293" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

        <avp name="Destination-Realm" code="283" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Auth-Application-Id" code="258" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Acct-Application-Id" code="259" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Vendor-Specific-Application-Id" code="260" must="M" may="P" must-not="V" may-encrypt="-">
			<data type="Grouped">
				<rule avp="Vendor-Id" required="true" max="1"/>
				<rule avp="Auth-Application-Id" required="false" max="1"/>
				<rule avp="Acct-Application-Id" required="false" max="1"/>
			</data>
		</avp>

		<avp name="Result-Code" code="268" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Error-Message" code="281" may="P" must-not="V,M" may-encrypt="-">
            <data type="UTF8String"/>
        </avp>

		<avp name="Error-Reporting-Host" code="294" may="P" must-not="V,M" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Host-IP-Address" code="257" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Address"/>
        </avp>

		<avp name="Vendor-Id" code="266" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Product-Name" code="269" may="P" must-not="V,M" may-encrypt="-">
            <data type="UTF8String"/>
        </avp>

		<avp name="Origin-State-Id" code="278" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Supported-Vendor-Id" code="265" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Firmware-Revision" code="267" must-not="V,M,P" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Inband-Security-Id" code="299" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="Unsigned32"/>
        </avp>

		<avp name="Disconnect-Cause" code="273" must="M" may="P" must-not="V" may-encrypt="-">
			<data type="Enumerated">
				<item code="0" name="REBOOTING"/>
				<item code="1" name="BUSY"/>
				<item code="2" name="DO_NOT_WANT_TO_TALK_TO_YOU"/>
			</data>
        </avp>

		<avp name="Route-Record" code="282" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Proxy-Host" code="280" must="M" may="P" must-not="V" may-encrypt="-">
            <data type="DiameterIdentity"/>
        </avp>

		<avp name="Proxy-State" code="33" must="M" may="P" must-not="V" may-encrypt="Y">
            <data type="OctetString"/>
        </avp>

		<avp name="CC-Request-Number" code="415" must="M" may="P" must-not="V" may-encrypt="Y">
			<data type="Unsigned32"/>
		</avp>

		<avp name="Service-Information" code="873" must="V,M" may="P" must-not="-" may-encrypt="N" vendor-id="10415">
			<data type="Grouped">
				<rule avp="PS-Information" required="false" max="1"/>
			</data>
		</avp>

		<avp name="PS-Information" code="874" must="V,M" may="P" must-not="-" may-encrypt="N" vendor-id="10415">
			<data type="Grouped">
				<rule avp="Called-Station-Id" required="false" max="1"/>
			</data>
		</avp>

		<avp name="Called-Station-Id" code="30" must="M" may="-" must-not="V" may-encrypt="Y">
            <data type="UTF8String"/>
        </avp>

		<avp name="CC-Request-Type" code="416" must="M" may="P" must-not="V" may-encrypt="Y">
			<data type="Enumerated">
				<item code="1" name="INITIAL_REQUEST"/>
				<item code="2" name="UPDATE_REQUEST"/>
				<item code="3" name="TERMINATION_REQUEST"/>
			</data>
		</avp>

		<avp name="Timezone-Offset" code="571" vendor-id="10415" must="V" may-encrypt="Y">
			<data type="Integer32"/>
		</avp>

    </application>
</diameter>
    "#;
        xml
    };
}
