//! Canned demo scenario: one approved school with a funded wallet, three
//! students, a template, and a stored price config.

use rust_decimal_macros::dec;

use diploma_types::{
    KycStatus, PriceConfig, SchoolId, SchoolProfile, StudentId, StudentProfile, TemplateId,
    TemplateSummary, UserId,
};

use crate::auth::MockAuth;
use crate::content::MockContentStore;
use crate::directory::MockDirectory;
use crate::wallet::MockWallet;

pub const SCHOOL_EMAIL: &str = "registrar@horizon.test";
pub const SCHOOL_PASSWORD: &str = "orbital-stamp-43";

const EPOCH_MS: u64 = 1_754_000_000_000;

#[derive(Clone)]
pub struct DemoScenario {
    pub auth: MockAuth,
    pub directory: MockDirectory,
    pub wallet: MockWallet,
    pub content: MockContentStore,
    pub school_id: SchoolId,
    pub user_id: UserId,
    pub students: Vec<StudentId>,
    pub template: TemplateId,
}

impl Default for DemoScenario {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoScenario {
    pub fn new() -> Self {
        let school_id = SchoolId::new("sch-horizon").expect("non-empty id");
        let user_id = UserId::new("usr-horizon").expect("non-empty id");

        let profile = SchoolProfile {
            id: school_id.clone(),
            user_id: user_id.clone(),
            name: "Horizon Polytechnic".to_string(),
            email: SCHOOL_EMAIL.to_string(),
            website: Some("https://horizon.test".to_string()),
            logo_url: None,
            address: None,
            public_wallet: "addr_test1horizon0001".to_string(),
            kyc_status: KycStatus::Approved,
            balance: dec!(120.00),
            created_at_unix_millis: EPOCH_MS,
            updated_at_unix_millis: EPOCH_MS,
        };

        let auth = MockAuth::new();
        auth.seed_account(SCHOOL_EMAIL, SCHOOL_PASSWORD, profile.clone());

        let directory = MockDirectory::new();
        directory.seed_school(&profile);

        let students = demo_students();
        for student in &students {
            directory.seed_student(student);
        }

        let template = TemplateId::new("tpl-classic").expect("non-empty id");
        directory.seed_template(&TemplateSummary {
            id: template.clone(),
            school_id: school_id.clone(),
            name: "Classic Blue".to_string(),
            background_image: None,
        });

        directory.set_price_config(&PriceConfig {
            network_fee_percent: dec!(2),
            storage_free_limit: 100,
            storage_price_per_1000: dec!(3.50),
            base_price: dec!(25.00),
            updated_at_unix_millis: EPOCH_MS,
        });

        // 12 ADA across four outputs, comfortably above the mint minimum.
        let wallet = MockWallet::new(12_000_000, 4);

        Self {
            auth,
            directory,
            wallet,
            content: MockContentStore::new(),
            school_id,
            user_id,
            students: students.into_iter().map(|s| s.id).collect(),
            template,
        }
    }
}

fn demo_students() -> Vec<StudentProfile> {
    let make = |id: &str, name: &str, matricule: &str, faculty: &str| StudentProfile {
        id: StudentId::new(id).expect("non-empty id"),
        full_name: name.to_string(),
        matricule: matricule.to_string(),
        email: format!("{}@student.horizon.test", matricule.to_lowercase()),
        faculty: Some(faculty.to_string()),
        level: Some("Masters".to_string()),
        wallet: None,
        created_at_unix_millis: EPOCH_MS,
    };
    vec![
        make("stu-ama", "Ama Diallo", "MAT-0042", "Engineering"),
        make("stu-kofi", "Kofi Mensah", "MAT-0057", "Computer Science"),
        make("stu-lena", "Lena Okafor", "MAT-0063", "Architecture"),
    ]
}
