use serde::Serialize;

/// Services a patient can book. Validation accepts exactly these titles.
pub const SERVICES: [&str; 6] = [
    "Back Pain & Spine Care",
    "Sports Injury Recovery",
    "Joint Pain & Arthritis",
    "Post-Surgery Rehabilitation",
    "Neurological Conditions",
    "Pediatric Physiotherapy",
];

pub const TIME_SLOTS: [&str; 10] = [
    "09:00 AM", "10:00 AM", "11:00 AM", "12:00 PM",
    "02:00 PM", "03:00 PM", "04:00 PM", "05:00 PM",
    "06:00 PM", "07:00 PM",
];

pub const CONTACT_SUBJECTS: [&str; 6] = [
    "General Inquiry",
    "Booking Assistance",
    "Technical Support",
    "Treatment Information",
    "Insurance Claims",
    "Feedback/Complaint",
];

pub const WHATSAPP_QUICK_MESSAGES: [&str; 5] = [
    "I want to book a consultation",
    "What are your consultation timings?",
    "Do you treat back pain?",
    "What are your charges?",
    "Can I get a home visit?",
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PricingPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub amount_rupees: i32,
    pub duration: &'static str,
    pub popular: bool,
    pub features: &'static [&'static str],
}

impl PricingPlan {
    pub fn amount_paise(&self) -> i32 {
        self.amount_rupees * 100
    }
}

pub const DEFAULT_PLAN_ID: &str = "single";

pub static PRICING_PLANS: [PricingPlan; 3] = [
    PricingPlan {
        id: "single",
        name: "Single Consultation",
        amount_rupees: 800,
        duration: "45 minutes",
        popular: false,
        features: &[
            "Detailed assessment",
            "Personalized exercise plan",
            "Follow-up recommendations",
            "Digital exercise guide",
        ],
    },
    PricingPlan {
        id: "package",
        name: "Treatment Package",
        amount_rupees: 3500,
        duration: "5 sessions",
        popular: true,
        features: &[
            "5 consultation sessions",
            "Progress tracking",
            "Customized treatment plan",
            "WhatsApp support",
            "Exercise video library",
        ],
    },
    PricingPlan {
        id: "complete",
        name: "Complete Recovery",
        amount_rupees: 6500,
        duration: "10 sessions",
        popular: false,
        features: &[
            "10 consultation sessions",
            "Comprehensive assessment",
            "24/7 support access",
            "Nutrition guidance",
            "Recovery guarantee",
        ],
    },
];

pub fn find_plan(id: &str) -> Option<&'static PricingPlan> {
    PRICING_PLANS.iter().find(|plan| plan.id == id)
}

#[derive(Debug, Clone, Serialize)]
pub struct Testimonial {
    pub name: &'static str,
    pub location: &'static str,
    pub rating: u8,
    pub text: &'static str,
}

pub static TESTIMONIALS: [Testimonial; 3] = [
    Testimonial {
        name: "Priya Sharma",
        location: "Mumbai",
        rating: 5,
        text: "Dr. Patel helped me recover from my back injury completely through online sessions. The personalized exercises worked wonders!",
    },
    Testimonial {
        name: "Rajesh Kumar",
        location: "Delhi",
        rating: 5,
        text: "Excellent service! The online consultation was thorough and the treatment plan was very effective for my knee pain.",
    },
    Testimonial {
        name: "Anita Desai",
        location: "Bangalore",
        rating: 5,
        text: "Professional and caring approach. My shoulder mobility improved significantly within 6 weeks of treatment.",
    },
];

/// One stop of the first-visit tour. Title and description are i18n keys.
#[derive(Debug, Clone, Serialize)]
pub struct TourStep {
    pub id: &'static str,
    pub title_key: &'static str,
    pub description_key: &'static str,
    pub anchor: Option<&'static str>,
    pub position: &'static str,
}

pub static TOUR_STEPS: [TourStep; 6] = [
    TourStep { id: "welcome", title_key: "guide.welcome.title", description_key: "guide.welcome.desc", anchor: None, position: "bottom" },
    TourStep { id: "services", title_key: "guide.services.title", description_key: "guide.services.desc", anchor: Some("#services-section"), position: "top" },
    TourStep { id: "booking", title_key: "guide.booking.title", description_key: "guide.booking.desc", anchor: Some(".book-consultation-btn"), position: "bottom" },
    TourStep { id: "payment", title_key: "guide.payment.title", description_key: "guide.payment.desc", anchor: None, position: "top" },
    TourStep { id: "consultation", title_key: "guide.consultation.title", description_key: "guide.consultation.desc", anchor: None, position: "bottom" },
    TourStep { id: "support", title_key: "guide.support.title", description_key: "guide.support.desc", anchor: Some(".whatsapp-widget"), position: "left" },
];
